//! Core types and shared functionality for External Brain.
//!
//! This crate provides:
//! - Generation-scoped response cache with SQLite backend
//! - Request/response types shared by the worker and server
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, EntrySummary, GenerationSummary};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, RequestIdentity, RequestMode, Response, ResponseSnapshot};
