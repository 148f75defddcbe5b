//! Offline cache controller for External Brain.
//!
//! A worker intercepts every request the app makes: network first, then the
//! current cache generation, then the precached offline page. New versions
//! install into their own generation and take over once activated.

pub mod controller;
pub mod fetch;
pub mod host;
pub mod worker;

#[cfg(test)]
mod testing;

pub use controller::{
    ActivateReport, ClientMessage, Controller, FetchOutcome, LifecycleState, ResponseSource, WorkerSettings,
};
pub use fetch::{HttpConfig, HttpNetwork, Network, NetworkError};
pub use host::{Registration, RegistrationStatus, WorkerStatus};
pub use worker::{WorkerEvent, WorkerHandle};
