//! Database module
//!
//! This module provides all table-level persistence:
//! - Model definitions shared with the hosted backend
//! - The [`Store`] trait the services are written against
//! - The local SQLite implementation with its schema and migrations

pub mod models;
pub mod repository;
pub mod schema;
pub mod store;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;
pub use store::Store;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection
/// sees the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Phase 1: run migrations on a single dedicated connection, so every
    // PRAGMA and every DDL statement executes on the same connection.
    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    // Phase 2: create the application pool. Its connections are opened
    // after the migrations committed.
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
///
/// Every SQLite in-memory connection is its own database, so the pool is
/// capped at one connection.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    initialize_database(&pool).await?;

    Ok(pool)
}
