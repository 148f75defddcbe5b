//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (EXTERNAL_BRAIN_*)
//! 2. TOML config file (if EXTERNAL_BRAIN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (EXTERNAL_BRAIN_*)
/// 2. TOML config file (if EXTERNAL_BRAIN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin every route is resolved against.
    ///
    /// Set via EXTERNAL_BRAIN_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Name of the cache generation this deployment writes to.
    ///
    /// Bump on every deploy that changes precached content or the route set;
    /// it is the only cache-invalidation trigger.
    /// Set via EXTERNAL_BRAIN_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Routes fetched and stored at install time.
    ///
    /// Set via EXTERNAL_BRAIN_PRECACHE_ROUTES, e.g. `["/", "/spoons"]`.
    #[serde(default = "default_precache_routes")]
    pub precache_routes: Vec<String>,

    /// Page served for offline navigations that miss the cache.
    ///
    /// Must be one of `precache_routes`.
    /// Set via EXTERNAL_BRAIN_OFFLINE_ROUTE environment variable.
    #[serde(default = "default_offline_route")]
    pub offline_route: String,

    /// Activate a freshly installed worker without waiting for a
    /// SKIP_WAITING message.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Path to SQLite cache database.
    ///
    /// Set via EXTERNAL_BRAIN_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network timeout in milliseconds; a timeout is treated as a network
    /// failure and triggers the offline fallback.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:5173".into()
}

fn default_cache_version() -> String {
    "external-brain-v1".into()
}

fn default_precache_routes() -> Vec<String> {
    ["/", "/spoons", "/feed", "/offline"].into_iter().map(String::from).collect()
}

fn default_offline_route() -> String {
    "/offline".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./external-brain-cache.sqlite")
}

fn default_user_agent() -> String {
    "external-brain/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_version: default_cache_version(),
            precache_routes: default_precache_routes(),
            offline_route: default_offline_route(),
            skip_waiting_on_install: true,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `EXTERNAL_BRAIN_`
    /// 2. TOML file from `EXTERNAL_BRAIN_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("EXTERNAL_BRAIN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("EXTERNAL_BRAIN_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
