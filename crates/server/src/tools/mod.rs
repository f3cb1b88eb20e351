//! MCP tool implementations.
//!
//! Each tool drives one entry point of the engine and returns its result
//! as pretty-printed JSON text.

pub mod fetch;
pub mod message;
pub mod notify;
pub mod status;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ServerError;

pub use fetch::SwFetchParams;
pub use message::SwMessageParams;
pub use notify::{SwClickParams, SwPushParams, SwSyncParams};

fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ServerError::EncodeFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
