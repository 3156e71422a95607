//! Hosted backend
//!
//! PostgREST tables, object storage and email/password auth of a hosted
//! project, behind the same [`Store`](crate::database::Store),
//! [`ObjectStore`](crate::storage::ObjectStore) and
//! [`AuthProvider`](crate::services::AuthProvider) seams as local mode.

pub mod auth;
pub mod client;

pub use auth::HostedAuth;
pub use client::SupabaseClient;
