//! MCP tool implementations.
//!
//! This module contains all tools exposed by the external-brain server.

pub mod brain_fetch;
pub mod cache;
pub mod worker;

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, rmcp::ErrorData> {
    let json = serde_json::to_string_pretty(output).map_err(ebrain_core::Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
