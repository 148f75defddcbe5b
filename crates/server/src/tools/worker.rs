//! worker_message and worker_status tool implementations.

use ebrain_worker::RegistrationStatus;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json_result;
use crate::state::BrainState;

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message posted by the app, e.g. `{"type": "SKIP_WAITING"}`.
    pub message: Value,
}

/// Output from the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    /// Whether a worker recognized the message.
    pub handled: bool,
    /// Registration after delivery.
    pub status: RegistrationStatus,
}

pub async fn message_impl(state: &BrainState, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let handled = state.registration.post_message(params.message).await?;
    let status = state.registration.status().await;
    json_result(&WorkerMessageOutput { handled, status })
}

pub async fn status_impl(state: &BrainState) -> Result<CallToolResult, McpError> {
    json_result(&state.registration.status().await)
}
