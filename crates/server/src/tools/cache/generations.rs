//! cache_generations tool implementation.

use ebrain_core::GenerationSummary;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::BrainState;
use crate::tools::json_result;

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    /// Generation currently serving fetches.
    pub current: String,
    /// Every generation on disk, oldest first.
    pub generations: Vec<GenerationSummary>,
}

pub async fn generations_impl(state: &BrainState) -> Result<CallToolResult, McpError> {
    let generations = state.cache.generations().await?;
    let current = state.current_generation().await;
    json_result(&CacheGenerationsOutput { current, generations })
}
