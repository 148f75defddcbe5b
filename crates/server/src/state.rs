//! Shared state handed to every tool call.

use std::sync::Arc;

use ebrain_core::CacheDb;
use ebrain_worker::{Registration, WorkerSettings};

pub struct BrainState {
    pub registration: Registration,
    pub cache: CacheDb,
    /// Settings of the configured worker; used to resolve tool URLs and to
    /// name the current generation when no worker is active.
    pub settings: WorkerSettings,
}

impl BrainState {
    pub fn new(registration: Registration, cache: CacheDb, settings: WorkerSettings) -> Arc<Self> {
        Arc::new(Self { registration, cache, settings })
    }

    /// The generation fetches are served from: the active worker's, falling
    /// back to the configured version.
    pub async fn current_generation(&self) -> String {
        self.registration
            .active_version()
            .await
            .unwrap_or_else(|| self.settings.version.clone())
    }
}
