//! The offline cache controller.
//!
//! One [`Controller`] is one worker generation: it owns the name of the cache
//! generation it writes to, its lifecycle state, and the skip-waiting flag
//! the host reads when deciding whether to promote it.
//!
//! - [`lifecycle`]: install (precache) and activate (purge stale generations)
//! - [`intercept`]: network-first fetch handling with cache/offline fallback
//! - [`messages`]: client messages such as `SKIP_WAITING`

pub mod intercept;
pub mod lifecycle;
pub mod messages;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ebrain_core::{AppConfig, CacheDb, ConfigError, Error};
use tokio::sync::watch;
use url::Url;

use crate::fetch::{Network, resolve};

pub use intercept::{FetchOutcome, ResponseSource};
pub use lifecycle::{ActivateReport, LifecycleState};
pub use messages::ClientMessage;

/// Per-generation settings, fixed for the lifetime of a controller.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Cache generation name, e.g. `external-brain-v1`.
    pub version: String,
    pub origin: Url,
    pub precache_routes: Vec<String>,
    pub offline_route: String,
    pub skip_waiting_on_install: bool,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            version: config.cache_version.clone(),
            origin: config.origin_url()?,
            precache_routes: config.precache_routes.clone(),
            offline_route: config.offline_route.clone(),
            skip_waiting_on_install: config.skip_waiting_on_install,
        })
    }

    /// Absolute URL for a route path (or absolute URL) under this origin.
    pub fn resolve(&self, target: &str) -> Result<Url, Error> {
        Ok(resolve(&self.origin, target)?)
    }

    pub fn offline_url(&self) -> Result<Url, Error> {
        self.resolve(&self.offline_route)
    }
}

/// A single worker generation.
pub struct Controller {
    settings: WorkerSettings,
    cache: CacheDb,
    network: Arc<dyn Network>,
    state: watch::Sender<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl Controller {
    pub fn new(settings: WorkerSettings, cache: CacheDb, network: Arc<dyn Network>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Parsed);
        Self { settings, cache, network, state, skip_waiting: AtomicBool::new(false) }
    }

    /// Name of the cache generation this controller owns.
    pub fn version(&self) -> &str {
        &self.settings.version
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Ask the host to activate this worker without waiting for existing
    /// clients to go away.
    pub fn skip_waiting(&self) {
        if !self.skip_waiting.swap(true, Ordering::SeqCst) {
            tracing::debug!(version = %self.version(), "skip waiting requested");
        }
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Move from `from` to `to`, or fail without changing state.
    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let mut actual = from;
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                actual = *state;
                false
            }
        });

        if moved {
            tracing::debug!(version = %self.version(), %from, %to, "lifecycle transition");
            Ok(())
        } else {
            Err(Error::InvalidState { expected: from.to_string(), actual: actual.to_string() })
        }
    }

    fn fail(&self) {
        self.state.send_replace(LifecycleState::Failed);
    }
}
