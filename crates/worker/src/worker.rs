//! Worker event loop.
//!
//! Each worker runs one task that receives [`WorkerEvent`]s in order.
//! Install, activate and message events are handled inline, so an install
//! finishes before a queued activate starts. Fetch events are spawned, so
//! any number can be in flight at once. Every event carries a oneshot that
//! signals completion back to the host.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ebrain_core::{Error, Request};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::controller::{ActivateReport, Controller, FetchOutcome, LifecycleState};

const EVENT_QUEUE: usize = 64;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Events delivered to a worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Install(oneshot::Sender<Result<(), Error>>),
    Activate(oneshot::Sender<Result<ActivateReport, Error>>),
    Fetch(Request, oneshot::Sender<FetchOutcome>),
    Message(Value, oneshot::Sender<bool>),
}

/// Sending side of a running worker. The loop stops once every handle is
/// dropped; fetches already in flight still complete.
#[derive(Clone)]
pub struct WorkerHandle {
    id: u64,
    controller: Arc<Controller>,
    events: mpsc::Sender<WorkerEvent>,
}

/// Start the event loop for `controller`.
pub fn spawn(controller: Arc<Controller>) -> WorkerHandle {
    let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
    let (events, rx) = mpsc::channel(EVENT_QUEUE);
    tokio::spawn(run(id, controller.clone(), rx));
    WorkerHandle { id, controller, events }
}

async fn run(id: u64, controller: Arc<Controller>, mut events: mpsc::Receiver<WorkerEvent>) {
    tracing::debug!(worker = id, version = %controller.version(), "worker started");

    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Install(reply) => {
                let _ = reply.send(controller.install().await);
            }
            WorkerEvent::Activate(reply) => {
                let _ = reply.send(controller.activate().await);
            }
            WorkerEvent::Fetch(request, reply) => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    let outcome = controller.handle_fetch(request).await;
                    let _ = reply.send(outcome);
                });
            }
            WorkerEvent::Message(message, reply) => {
                let _ = reply.send(controller.handle_message(&message));
            }
        }
    }

    tracing::debug!(worker = id, version = %controller.version(), "worker stopped");
}

impl WorkerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn state(&self) -> LifecycleState {
        self.controller.state()
    }

    pub async fn install(&self) -> Result<(), Error> {
        self.request(WorkerEvent::Install).await?
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.request(WorkerEvent::Activate).await?
    }

    pub async fn fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        self.request(|reply| WorkerEvent::Fetch(request, reply)).await
    }

    pub async fn post_message(&self, message: Value) -> Result<bool, Error> {
        self.request(|reply| WorkerEvent::Message(message, reply)).await
    }

    async fn request<T>(&self, event: impl FnOnce(oneshot::Sender<T>) -> WorkerEvent) -> Result<T, Error> {
        let (reply, done) = oneshot::channel();
        self.events
            .send(event(reply))
            .await
            .map_err(|_| Error::WorkerStopped)?;
        done.await.map_err(|_| Error::WorkerStopped)
    }
}
