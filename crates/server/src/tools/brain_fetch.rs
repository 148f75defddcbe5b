//! brain_fetch tool implementation.
//!
//! Runs one request through the host exactly as the app would issue it and
//! reports where the response came from.

use std::collections::BTreeMap;

use ebrain_core::http::{is_token, validate_header};
use ebrain_core::{Error, Request, RequestMode};
use ebrain_worker::{FetchOutcome, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::BrainState;

/// Input parameters for brain_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BrainFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: RequestMode,

    /// Request headers.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,

    /// Request body, sent as-is.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for brain_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BrainFetchOutput {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Response body, decoded as UTF-8 (lossy).
    pub body: String,
    /// Where the response came from.
    pub source: ResponseSource,
}

impl From<FetchOutcome> for BrainFetchOutput {
    fn from(outcome: FetchOutcome) -> Self {
        let response = outcome.response;
        let body = String::from_utf8_lossy(response.body()).into_owned();
        Self {
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body,
            source: outcome.source,
        }
    }
}

/// Validate the parameters and build the request the app would issue.
pub fn build_request(state: &BrainState, params: BrainFetchParams) -> Result<Request, Error> {
    let method = params.method.trim();
    if method.is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()));
    }
    if !is_token(method) {
        return Err(Error::InvalidInput(format!("invalid method: {method}")));
    }

    let url = state.settings.resolve(&params.url)?;
    let mut request = Request::new(method, url, params.mode);
    for (name, value) in params.headers.unwrap_or_default() {
        validate_header(&name, &value)?;
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }
    Ok(request)
}

/// Run the request through the host. The background cache write, if any,
/// is left running.
pub async fn run_fetch(state: &BrainState, params: BrainFetchParams) -> Result<FetchOutcome, Error> {
    let request = build_request(state, params)?;
    tracing::debug!(method = %request.method, url = %request.url, mode = %request.mode, "brain_fetch");
    Ok(state.registration.fetch(request).await)
}

/// Implementation of the brain_fetch tool.
pub async fn fetch_impl(state: &BrainState, params: BrainFetchParams) -> Result<CallToolResult, McpError> {
    let outcome = run_fetch(state, params).await?;
    json_result(&BrainFetchOutput::from(outcome))
}
