//! Storage module
//!
//! Provides bucketed object storage for uploaded files (avatars, will media).

pub mod object_store;

pub use object_store::{object_key, LocalObjectStore, ObjectStore};
pub(crate) use object_store::write_atomic;
