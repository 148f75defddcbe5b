//! cache_entries tool implementation.
//!
//! Lists what one generation holds, without bodies.

use ebrain_core::{EntrySummary, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::BrainState;
use crate::tools::json_result;

/// Parameters for the cache_entries tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntriesParams {
    /// Generation to list (default: the one currently serving fetches).
    #[serde(default)]
    pub generation: Option<String>,
}

/// Output from the cache_entries tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntriesOutput {
    pub generation: String,
    pub entries: Vec<EntrySummary>,
}

pub async fn entries_impl(state: &BrainState, params: CacheEntriesParams) -> Result<CallToolResult, McpError> {
    let generation = match params.generation {
        Some(name) if name.trim().is_empty() => {
            return Err(Error::InvalidInput("generation cannot be empty".into()).into());
        }
        Some(name) => name,
        None => state.current_generation().await,
    };

    if !state.cache.has_generation(&generation).await? {
        return Err(Error::InvalidInput(format!("unknown generation: {generation}")).into());
    }

    let entries = state.cache.list_entries(&generation).await?;
    json_result(&CacheEntriesOutput { generation, entries })
}
