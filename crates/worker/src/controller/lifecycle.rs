//! Cache lifecycle: install and activate.
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Active
//!               |
//!               +-> Failed
//! ```
//!
//! Install is all-or-nothing: every precache route is fetched before
//! anything is written, and the generation is created together with its
//! entries in one transaction. Activate deletes every other generation on a
//! best-effort basis; failures are reported, never fatal.

use std::fmt;

use ebrain_core::{Error, Request};
use futures_util::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Controller;

/// Lifecycle state of a worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Created, install not started.
    Parsed,
    Installing,
    /// Precache complete; waiting to be activated.
    Installed,
    Activating,
    /// Serving fetches.
    Active,
    /// Install failed. Terminal.
    Failed,
}

impl LifecycleState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of stale-generation cleanup during activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivateReport {
    /// Generations removed.
    pub deleted: Vec<String>,
    /// Generations that could not be removed; they stay on disk unread.
    pub failed: Vec<String>,
}

impl Controller {
    /// Precache every route into this controller's generation.
    ///
    /// On failure the controller becomes [`LifecycleState::Failed`] and no
    /// entry is written. On success skip-waiting is requested when
    /// `skip_waiting_on_install` is set.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing)?;
        tracing::info!(
            version = %self.version(),
            routes = self.settings.precache_routes.len(),
            "installing cache generation"
        );

        match self.precache().await {
            Ok(stored) => {
                self.transition(LifecycleState::Installing, LifecycleState::Installed)?;
                tracing::info!(version = %self.version(), stored, "cache generation installed");
                if self.settings.skip_waiting_on_install {
                    self.skip_waiting();
                }
                Ok(())
            }
            Err(err) => {
                self.fail();
                tracing::error!(version = %self.version(), error = %err, "install failed");
                Err(err)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let requests = self
            .settings
            .precache_routes
            .iter()
            .map(|route| -> Result<_, Error> { Ok((route.as_str(), Request::get(self.settings.resolve(route)?))) })
            .collect::<Result<Vec<_>, Error>>()?;

        let offline_url = self.settings.offline_url()?;
        if !requests.iter().any(|(_, request)| request.url == offline_url) {
            return Err(Error::PrecacheFailed {
                route: self.settings.offline_route.clone(),
                reason: "offline route is not in the precache set".into(),
            });
        }

        let results = join_all(requests.iter().map(|(_, request)| self.network.fetch(request))).await;

        let mut entries = Vec::with_capacity(requests.len());
        for ((route, request), result) in requests.into_iter().zip(results) {
            let response =
                result.map_err(|e| Error::PrecacheFailed { route: route.to_string(), reason: e.to_string() })?;
            if !response.is_success() {
                return Err(Error::PrecacheFailed {
                    route: route.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            entries.push((request.identity(), response.into_snapshot()));
        }

        self.cache.install_generation(self.version(), entries).await
    }

    /// Delete every generation other than this one and become active.
    ///
    /// The host claims clients for this worker once this returns.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating)?;
        tracing::info!(version = %self.version(), "activating cache generation");

        let mut report = ActivateReport::default();
        match self.cache.generation_names().await {
            Ok(names) => {
                let stale: Vec<String> = names.into_iter().filter(|name| name != self.version()).collect();
                let results = join_all(stale.iter().map(|name| self.cache.delete_generation(name))).await;

                for (name, result) in stale.into_iter().zip(results) {
                    match result {
                        Ok(_) => {
                            tracing::info!(generation = %name, "deleted stale cache generation");
                            report.deleted.push(name);
                        }
                        Err(err) => {
                            tracing::warn!(generation = %name, error = %err, "failed to delete stale cache generation");
                            report.failed.push(name);
                        }
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to list cache generations"),
        }

        self.transition(LifecycleState::Activating, LifecycleState::Active)?;
        tracing::info!(version = %self.version(), deleted = report.deleted.len(), "cache generation active");
        Ok(report)
    }
}
