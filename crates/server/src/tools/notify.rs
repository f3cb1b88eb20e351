//! Push, notification click and background sync tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sigcache_engine::{ClientWindow, Engine};

use super::json_result;

/// Input parameters for sw_push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwPushParams {
    /// Raw push payload: a JSON object or plain text.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Input parameters for sw_notification_click tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwClickParams {
    /// Currently open application windows.
    #[serde(default)]
    pub windows: Vec<ClientWindow>,
}

/// Input parameters for sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Sync registration tag, e.g. "sync-locations".
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncOutput {
    pub tag: String,
    pub handled: bool,
}

pub fn push_impl(engine: &Engine, params: &SwPushParams) -> Result<CallToolResult, McpError> {
    let notification = engine.handle_push(params.payload.as_deref().map(str::as_bytes));
    json_result(&notification)
}

pub fn click_impl(engine: &Engine, params: &SwClickParams) -> Result<CallToolResult, McpError> {
    json_result(&engine.handle_notification_click(&params.windows))
}

pub async fn sync_impl(engine: &Engine, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let handled = engine.handle_sync(&params.tag).await?;
    json_result(&SwSyncOutput { tag: params.tag, handled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{engine, json};

    #[tokio::test]
    async fn test_push_json_payload() {
        let (engine, _) = engine().await;
        let params = SwPushParams { payload: Some(r#"{"title":"Alerte","tag":"crue"}"#.into()) };
        let output = json(&push_impl(&engine, &params).unwrap());
        assert_eq!(output["title"], "Alerte");
        assert_eq!(output["body"], "Nouvelle notification");
        assert_eq!(output["tag"], "crue");
        assert_eq!(output["requireInteraction"], false);
    }

    #[tokio::test]
    async fn test_push_without_payload() {
        let (engine, _) = engine().await;
        let output = json(&push_impl(&engine, &SwPushParams::default()).unwrap());
        assert_eq!(output["title"], "SIG Sénégal");
    }

    #[tokio::test]
    async fn test_click_focus_and_open() {
        let (engine, _) = engine().await;
        let open = json(&click_impl(&engine, &SwClickParams::default()).unwrap());
        assert_eq!(open, serde_json::json!({"action": "open_window", "url": "http://localhost:8080/"}));

        let params = SwClickParams {
            windows: vec![ClientWindow { id: "tab-1".into(), url: "http://localhost:8080/index.html".into() }],
        };
        let focus = json(&click_impl(&engine, &params).unwrap());
        assert_eq!(focus, serde_json::json!({"action": "focus", "id": "tab-1"}));
    }

    #[tokio::test]
    async fn test_sync_tags() {
        let (engine, _) = engine().await;
        let output = json(&sync_impl(&engine, SwSyncParams { tag: "sync-locations".into() }).await.unwrap());
        assert_eq!(output["handled"], true);

        let output = json(&sync_impl(&engine, SwSyncParams { tag: "other".into() }).await.unwrap());
        assert_eq!(output["handled"], false);
    }
}
