//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

/// A path under the origin. `//host` and `/\host` are scheme-relative and
/// would resolve to another host.
fn is_origin_path(route: &str) -> bool {
    route.starts_with('/') && !matches!(route.as_bytes().get(1), Some(b'/' | b'\\'))
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `precache_routes` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `cache_version` is empty or contains whitespace
    /// - `origin` is not an http(s) URL
    /// - a route does not start with `/`, or starts with `//`
    /// - `offline_route` is not one of `precache_routes`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }
        if self.cache_version.chars().any(char::is_whitespace) {
            return Err(invalid("cache_version", "must not contain whitespace"));
        }

        self.origin_url()?;

        if self.precache_routes.is_empty() {
            return Err(ConfigError::Missing {
                field: "precache_routes".into(),
                hint: "at least the offline route must be precached".into(),
            });
        }
        if let Some(route) = self.precache_routes.iter().find(|r| !is_origin_path(r)) {
            return Err(invalid("precache_routes", format!("route must be a path under the origin: {route}")));
        }

        if !is_origin_path(&self.offline_route) {
            return Err(invalid("offline_route", "must be a path under the origin"));
        }
        if !self.precache_routes.contains(&self.offline_route) {
            return Err(invalid("offline_route", format!("{} is not in precache_routes", self.offline_route)));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let unique: HashSet<&str> = self.precache_routes.iter().map(String::as_str).collect();
        if unique.len() != self.precache_routes.len() {
            tracing::warn!(
                routes = self.precache_routes.len(),
                unique = unique.len(),
                "precache_routes contains duplicates; each route is fetched once per duplicate"
            );
        }

        Ok(())
    }
}
