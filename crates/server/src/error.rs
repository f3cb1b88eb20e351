//! Errors raised by the tool layer itself, before or after the engine runs.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Tool arguments that cannot be turned into an engine call.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be serialized.
    #[error("ENCODE_FAILED: {0}")]
    EncodeFailed(String),
}

impl From<ServerError> for McpError {
    fn from(err: ServerError) -> Self {
        let (code, message) = match &err {
            ServerError::InvalidInput(msg) => (-32602, msg.clone()),
            ServerError::EncodeFailed(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_code() {
        let err: McpError = ServerError::InvalidInput("url cannot be empty".into()).into();
        assert_eq!(err.code.0, -32602);
        assert_eq!(err.message, "url cannot be empty");
    }

    #[test]
    fn test_display_prefix() {
        assert!(ServerError::EncodeFailed("x".into()).to_string().starts_with("ENCODE_FAILED"));
    }
}
