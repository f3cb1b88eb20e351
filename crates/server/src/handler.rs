//! MCP server handler implementation.
//!
//! Exposes the engine's entry points (fetch interception, page messages,
//! push, notification clicks, background sync) as MCP tools.
use std::sync::Arc;

use crate::tools::{
    SwClickParams, SwFetchParams, SwMessageParams, SwPushParams, SwSyncParams, fetch::fetch_impl,
    message::message_impl, notify, status::status_impl,
};

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
use sigcache_engine::Engine;

#[derive(Clone)]
pub struct SigOfflineServer {
    engine: Arc<Engine>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SigOfflineServer {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Fetch a URL through the offline cache engine. GET requests are classified into a cache partition and served cache-first, network-first or stale-while-revalidate, with offline fallbacks."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.engine, params.0).await
    }

    #[tool(
        description = "Post a page message to the engine: SKIP_WAITING, CLEAR_CACHE, GET_CACHE_SIZE, STORE_LOCATION, TRACKING_STARTED or TRACKING_STOPPED."
    )]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.engine, params.0).await
    }

    #[tool(description = "Lifecycle state, active version and per-partition cache usage.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.engine).await
    }

    #[tool(description = "Deliver a push payload and return the notification to display.")]
    async fn sw_push(&self, params: Parameters<SwPushParams>) -> Result<CallToolResult, McpError> {
        notify::push_impl(&self.engine, &params.0)
    }

    #[tool(description = "Resolve a notification click against the open windows: focus one in scope or open a new one.")]
    async fn sw_notification_click(&self, params: Parameters<SwClickParams>) -> Result<CallToolResult, McpError> {
        notify::click_impl(&self.engine, &params.0)
    }

    #[tool(description = "Fire a background sync event with the given tag.")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        notify::sync_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for SigOfflineServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sig-offline".into(),
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
