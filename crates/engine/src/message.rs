//! Page ↔ engine message protocol.
//!
//! Messages arrive as JSON objects tagged by `type`. Only `CLEAR_CACHE` and
//! `GET_CACHE_SIZE` produce a reply.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sigcache_core::Error;

/// Last known device position, stored for handoff to a later session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Milliseconds since the Unix epoch, as reported by the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Promote a waiting version to active right away.
    SkipWaiting,
    /// Delete every store. Replies `{"success": true}`.
    ClearCache,
    /// Total cached body bytes. Replies `{"size": n}`.
    GetCacheSize,
    StoreLocation { payload: Location },
    TrackingStarted,
    TrackingStopped,
}

impl Message {
    /// Decode a message from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMessage` for malformed JSON or an unknown `type`.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidMessage(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::SkipWaiting => "SKIP_WAITING",
            Message::ClearCache => "CLEAR_CACHE",
            Message::GetCacheSize => "GET_CACHE_SIZE",
            Message::StoreLocation { .. } => "STORE_LOCATION",
            Message::TrackingStarted => "TRACKING_STARTED",
            Message::TrackingStopped => "TRACKING_STOPPED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Reply {
    Cleared { success: bool },
    CacheSize { size: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_unit_messages() {
        assert_eq!(Message::parse(r#"{"type":"SKIP_WAITING"}"#).unwrap(), Message::SkipWaiting);
        assert_eq!(Message::parse(r#"{"type":"CLEAR_CACHE"}"#).unwrap(), Message::ClearCache);
        assert_eq!(Message::parse(r#"{"type":"GET_CACHE_SIZE"}"#).unwrap(), Message::GetCacheSize);
        assert_eq!(Message::parse(r#"{"type":"TRACKING_STARTED"}"#).unwrap(), Message::TrackingStarted);
        assert_eq!(Message::parse(r#"{"type":"TRACKING_STOPPED"}"#).unwrap(), Message::TrackingStopped);
    }

    #[test]
    fn test_parse_store_location() {
        let raw = r#"{"type":"STORE_LOCATION","payload":{"latitude":14.6937,"longitude":-17.4441,"accuracy":12.5,"timestamp":1700000000000}}"#;
        let Message::StoreLocation { payload } = Message::parse(raw).unwrap() else {
            panic!("expected STORE_LOCATION");
        };
        assert_eq!(payload.latitude, 14.6937);
        assert_eq!(payload.longitude, -17.4441);
        assert_eq!(payload.accuracy, Some(12.5));
        assert_eq!(payload.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_parse_location_without_optional_fields() {
        let raw = r#"{"type":"STORE_LOCATION","payload":{"latitude":14.0,"longitude":-16.0}}"#;
        let Message::StoreLocation { payload } = Message::parse(raw).unwrap() else {
            panic!("expected STORE_LOCATION");
        };
        assert!(payload.accuracy.is_none());
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(matches!(Message::parse(r#"{"type":"REBOOT"}"#), Err(Error::InvalidMessage(_))));
        assert!(matches!(Message::parse(r#"{"kind":"CLEAR_CACHE"}"#), Err(Error::InvalidMessage(_))));
        assert!(matches!(Message::parse("not json"), Err(Error::InvalidMessage(_))));
    }

    #[test]
    fn test_serialize_message_wire_shape() {
        assert_eq!(serde_json::to_value(Message::ClearCache).unwrap(), json!({"type": "CLEAR_CACHE"}));
        assert_eq!(Message::GetCacheSize.kind(), "GET_CACHE_SIZE");
    }

    #[test]
    fn test_reply_wire_shapes() {
        assert_eq!(serde_json::to_value(Reply::Cleared { success: true }).unwrap(), json!({"success": true}));
        assert_eq!(serde_json::to_value(Reply::CacheSize { size: 2048 }).unwrap(), json!({"size": 2048}));
    }
}
