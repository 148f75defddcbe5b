//! Cache-related MCP tools.
//!
//! This module provides read-only views of the SQLite cache generations.

pub mod entries;
pub mod generations;

pub use entries::{CacheEntriesParams, entries_impl};
pub use generations::generations_impl;
