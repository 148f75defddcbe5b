//! Host runtime: which worker controls fetches.
//!
//! A [`Registration`] holds at most one active worker (serving fetches) and
//! at most one waiting worker (installed, not yet activated). A newly
//! installed worker is promoted right away when it asked to skip waiting or
//! when nothing is active yet; otherwise it waits until a `SKIP_WAITING`
//! message arrives. Until promotion the previous worker keeps serving from
//! its own generation.

use std::sync::Arc;

use ebrain_core::{Error, Request};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::controller::{ActivateReport, Controller, FetchOutcome, LifecycleState, intercept::passthrough};
use crate::fetch::Network;
use crate::worker::{self, WorkerHandle};

/// Snapshot of one registered worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatus {
    pub id: u64,
    /// Cache generation the worker owns
    pub version: String,
    pub state: LifecycleState,
    pub skip_waiting: bool,
}

impl From<&WorkerHandle> for WorkerStatus {
    fn from(worker: &WorkerHandle) -> Self {
        Self {
            id: worker.id(),
            version: worker.controller().version().to_string(),
            state: worker.state(),
            skip_waiting: worker.controller().skip_waiting_requested(),
        }
    }
}

/// Active and waiting workers at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RegistrationStatus {
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
}

pub struct Registration {
    network: Arc<dyn Network>,
    active: RwLock<Option<WorkerHandle>>,
    waiting: Mutex<Option<WorkerHandle>>,
    /// Serializes register/promote so two installs never race to activate.
    transitions: Mutex<()>,
}

impl Registration {
    /// `network` serves uncontrolled fetches while no worker is active.
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self { network, active: RwLock::new(None), waiting: Mutex::new(None), transitions: Mutex::new(()) }
    }

    /// Install `controller` as a new worker and promote it if allowed.
    ///
    /// An install failure leaves the current active worker in control.
    pub async fn register(&self, controller: Controller) -> Result<WorkerHandle, Error> {
        let _guard = self.transitions.lock().await;
        let worker = worker::spawn(Arc::new(controller));
        let version = worker.controller().version().to_string();

        if let Err(err) = worker.install().await {
            tracing::error!(
                worker = worker.id(),
                %version,
                error = %err,
                "worker registration failed"
            );
            return Err(err);
        }

        let has_active = self.active.read().await.is_some();
        if worker.controller().skip_waiting_requested() || !has_active {
            self.promote(&worker).await?;
        } else {
            tracing::info!(worker = worker.id(), %version, "worker installed and waiting");
            if let Some(previous) = self.waiting.lock().await.replace(worker.clone()) {
                tracing::info!(worker = previous.id(), version = %previous.controller().version(), "replaced waiting worker");
            }
        }

        Ok(worker)
    }

    /// Activate `worker` and make it the one that receives fetches.
    async fn promote(&self, worker: &WorkerHandle) -> Result<ActivateReport, Error> {
        let report = worker.activate().await?;

        let previous = self.active.write().await.replace(worker.clone());
        if let Some(stale) = self.waiting.lock().await.take()
            && stale.id() != worker.id()
        {
            tracing::info!(worker = stale.id(), version = %stale.controller().version(), "discarded superseded waiting worker");
        }

        tracing::info!(
            worker = worker.id(),
            version = %worker.controller().version(),
            previous = ?previous.as_ref().map(|p| p.controller().version().to_string()),
            deleted = report.deleted.len(),
            "worker claimed clients"
        );
        Ok(report)
    }

    /// Route a request to the active worker, or straight to the network
    /// when there is none.
    pub async fn fetch(&self, request: Request) -> FetchOutcome {
        let active = self.active.read().await.clone();
        match active {
            Some(worker) => match worker.fetch(request.clone()).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(worker = worker.id(), error = %err, "active worker unavailable, passing through");
                    passthrough(self.network.as_ref(), &request).await
                }
            },
            None => passthrough(self.network.as_ref(), &request).await,
        }
    }

    /// Post a client message to the waiting worker, or the active one if
    /// nothing is waiting. Returns whether the message was recognized.
    pub async fn post_message(&self, message: Value) -> Result<bool, Error> {
        let _guard = self.transitions.lock().await;

        let waiting = self.waiting.lock().await.clone();
        let target = match waiting {
            Some(worker) => Some(worker),
            None => self.active.read().await.clone(),
        };
        let Some(target) = target else {
            tracing::debug!(%message, "no worker registered for message");
            return Ok(false);
        };

        let handled = target.post_message(message).await?;

        let is_waiting = self
            .waiting
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| w.id() == target.id());
        if is_waiting && target.controller().skip_waiting_requested() {
            self.promote(&target).await?;
        }

        Ok(handled)
    }

    pub async fn status(&self) -> RegistrationStatus {
        let active = self.active.read().await.as_ref().map(WorkerStatus::from);
        let waiting = self.waiting.lock().await.as_ref().map(WorkerStatus::from);
        RegistrationStatus { active, waiting }
    }

    /// Version of the active worker's generation.
    pub async fn active_version(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|w| w.controller().version().to_string())
    }
}
