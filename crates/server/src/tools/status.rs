//! sw_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use sigcache_engine::Engine;

use super::json_result;

/// Implementation of the sw_status tool.
pub async fn status_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    let status = engine.status().await?;
    json_result(&status)
}
