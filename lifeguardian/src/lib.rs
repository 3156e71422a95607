//! Life Guardian library
//!
//! Client core for a personal safety companion: daily check-ins, moods,
//! emergency contacts, a digital will and the life statistics shown on the
//! home screen. Runs against a local SQLite backend or a hosted project.

pub mod app;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod remote;
pub mod services;
pub mod stats;
pub mod storage;
