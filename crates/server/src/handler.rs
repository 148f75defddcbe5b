//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::BrainState;
use crate::tools::brain_fetch::{BrainFetchParams, fetch_impl};
use crate::tools::cache::{CacheEntriesParams, entries_impl, generations_impl};
use crate::tools::worker::{WorkerMessageParams, message_impl, status_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for external-brain.
#[derive(Clone)]
pub struct BrainServer {
    state: Arc<BrainState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl BrainServer {
    /// Create a new server handler.
    pub fn new(state: Arc<BrainState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Run a request through the offline cache controller.
    #[tool(
        description = "Fetch a URL through the offline cache controller. Network first; falls back to the current cache generation, then the offline page for navigations, then a 503."
    )]
    async fn brain_fetch(&self, params: Parameters<BrainFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Post a client message (e.g. {\"type\": \"SKIP_WAITING\"}) to the waiting or active worker.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.state, params.0).await
    }

    #[tool(description = "Show the active and waiting workers with their cache versions and lifecycle states.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.state).await
    }

    #[tool(description = "List cache generations with their entry counts.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.state).await
    }

    /// List the entries of one generation.
    ///
    /// Defaults to the generation currently serving fetches.
    #[tool(description = "List entries (method, url, status, stored_at, size) of a cache generation. Defaults to the current one.")]
    async fn cache_entries(&self, params: Parameters<CacheEntriesParams>) -> Result<CallToolResult, McpError> {
        entries_impl(&self.state, params.0).await
    }
}

impl ServerHandler for BrainServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "external-brain".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
