//! sw_message tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sigcache_engine::{Engine, Message, Reply};

use super::json_result;

/// Input parameters for sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message object, e.g. `{"type": "GET_CACHE_SIZE"}`.
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    #[serde(rename = "type")]
    pub kind: String,
    /// Reply posted back to the page, if the message has one.
    pub reply: Option<Reply>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(engine: &Engine, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let reply = engine.handle_message(&params.message).await?;
    json_result(&SwMessageOutput { kind: params.message.kind().to_string(), reply })
}
