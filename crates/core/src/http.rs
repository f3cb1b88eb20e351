//! Request and response snapshots.
//!
//! These are plain values, not live HTTP objects: a `Response` body is a
//! `Bytes` buffer so handing one copy to the cache and another to the
//! caller is a cheap reference-count bump.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// What the page intends to do with the response, as reported by the
/// requesting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
    Other,
}

/// A read-only request descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub destination: Option<Destination>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Build a GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, destination: None, headers: Vec::new() }
    }

    /// Build a request with an arbitrary method (uppercased).
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, destination: None, headers: Vec::new() }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Navigation requests load a top-level document.
    pub fn is_navigation(&self) -> bool {
        self.destination == Some(Destination::Document)
            || self.header("accept").is_some_and(|accept| accept.contains("text/html"))
    }
}

/// How the response was obtained, mirroring the fetch response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response with readable body.
    Cors,
    /// Cross-origin response without readable status or body.
    Opaque,
    /// Network error placeholder.
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }

    /// Inverse of [`ResponseKind::as_str`]; unknown values read as `Basic`.
    pub fn parse(value: &str) -> Self {
        match value {
            "cors" => ResponseKind::Cors,
            "opaque" => ResponseKind::Opaque,
            "error" => ResponseKind::Error,
            _ => ResponseKind::Basic,
        }
    }
}

/// A response snapshot: status, headers and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl Response {
    /// A basic 200 response with the given content type and body.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::with_status(200, "OK", content_type, body)
    }

    pub fn with_status(status: u16, status_text: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Only successful, non-opaque, non-error responses may be stored.
    pub fn is_cacheable(&self) -> bool {
        self.is_success() && !matches!(self.kind, ResponseKind::Opaque | ResponseKind::Error)
    }
}
