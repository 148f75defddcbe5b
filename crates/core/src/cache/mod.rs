//! SQLite-backed storage for versioned cache generations.
//!
//! This module provides the persistent key-value store the offline cache
//! controller serves from, using SQLite with async access via tokio-rusqlite.
//! It supports:
//!
//! - Named generations, one per deployed cache version
//! - Request-keyed entries using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntrySummary;
pub use generations::GenerationSummary;
