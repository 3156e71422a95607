//! Database schema and migrations
//!
//! Versioned SQL migrations for the local SQLite backend. Each migration
//! runs in its own transaction and is recorded in the `migrations` table.
//! File databases run in WAL mode.

use crate::error::Result;
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    // Enable WAL mode for better performance and crash safety
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // Create migrations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Get current version
    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    tracing::info!("Current database version: {}", current_version);

    // Apply migrations
    apply_migrations(pool, current_version).await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<()> {
    for (version, sql) in get_migrations() {
        if version <= current_version {
            continue;
        }

        tracing::info!("Applying migration version {}", version);

        // Execute migration in a transaction
        let mut tx = pool.begin().await?;

        // Run migration SQL
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        // Record migration
        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(())
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(1, include_str!("migrations/001_initial_schema.sql"))]
}
