//! Push notifications and notification clicks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetch::in_scope;

const DEFAULT_TITLE: &str = "SIG Sénégal";
const DEFAULT_BODY: &str = "Nouvelle notification";
const DEFAULT_TAG: &str = "sig-notification";

/// Notification to display, built from a push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub require_interaction: bool,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            tag: DEFAULT_TAG.to_string(),
            require_interaction: false,
        }
    }
}

/// Push payload fields; every one may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    tag: Option<String>,
    require_interaction: Option<bool>,
}

impl Notification {
    /// Build the notification for a push event.
    ///
    /// A JSON object fills the matching fields; any other non-empty payload
    /// becomes the body text.
    pub fn from_push(payload: Option<&[u8]>) -> Self {
        let defaults = Self::default();
        let Some(raw) = payload.filter(|raw| !raw.is_empty()) else {
            return defaults;
        };

        match serde_json::from_slice::<PushPayload>(raw) {
            Ok(data) => Self {
                title: data.title.unwrap_or(defaults.title),
                body: data.body.unwrap_or(defaults.body),
                tag: data.tag.unwrap_or(defaults.tag),
                require_interaction: data.require_interaction.unwrap_or(false),
            },
            Err(_) => Self { body: String::from_utf8_lossy(raw).into_owned(), ..defaults },
        }
    }
}

/// An open window of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClientWindow {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickAction {
    Focus { id: String },
    OpenWindow { url: String },
}

/// Focus the first window inside `scope`, or open one at the scope root.
pub fn resolve_click(windows: &[ClientWindow], scope: &Url) -> ClickAction {
    windows
        .iter()
        .find(|window| Url::parse(&window.url).is_ok_and(|url| in_scope(&url, scope)))
        .map(|window| ClickAction::Focus { id: window.id.clone() })
        .unwrap_or_else(|| ClickAction::OpenWindow { url: scope.to_string() })
}
