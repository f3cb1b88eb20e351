//! sw_fetch tool implementation.
//!
//! Runs a request through the engine exactly as an intercepted page fetch
//! would be: classified, served by its partition's strategy, with offline
//! fallbacks. Requests the engine does not intercept go straight to the
//! network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sigcache_core::{Destination, Request, Response};
use sigcache_engine::fetch::resolve;
use sigcache_engine::{Engine, FetchDisposition, ResponseSource, Route};

use super::json_result;
use crate::error::ServerError;

/// Bodies above this size are reported by length only.
const MAX_TEXT_BODY: usize = 64 * 1024;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path relative to the application scope.
    pub url: String,

    /// HTTP method (default: GET). Only GET is intercepted.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination, e.g. "document" for a navigation or "image".
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    /// Whether the engine handled the request or let it through.
    pub intercepted: bool,
    pub route: Option<Route>,
    pub source: ResponseSource,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body_size: usize,
    /// UTF-8 body for textual responses under 64KB.
    pub body_text: Option<String>,
    /// A background refresh of the cached entry is in flight.
    pub revalidating: bool,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(engine: &Engine, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&params.url, engine.scope()).map_err(|e| ServerError::InvalidInput(e.to_string()))?;
    let method = params.method.trim().to_ascii_uppercase();
    if method.is_empty() {
        return Err(ServerError::InvalidInput("method cannot be empty".into()).into());
    }

    let mut request = Request::new(&method, url);
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }
    if let Some(accept) = params.accept.as_deref() {
        request = request.with_header("accept", accept);
    }

    let output = match engine.handle_fetch(&request).await {
        FetchDisposition::Handled { route, executed } => describe(
            &request,
            &executed.response,
            Some(route),
            executed.source,
            executed.revalidation.is_some(),
        ),
        FetchDisposition::Bypass => {
            let response = engine.passthrough(&request).await?;
            describe(&request, &response, None, ResponseSource::Network, false)
        }
    };

    json_result(&output)
}

fn describe(
    request: &Request, response: &Response, route: Option<Route>, source: ResponseSource, revalidating: bool,
) -> SwFetchOutput {
    SwFetchOutput {
        url: request.url.to_string(),
        intercepted: route.is_some(),
        route,
        source,
        status: response.status,
        status_text: response.status_text.clone(),
        content_type: response.content_type().map(str::to_string),
        headers: response.headers.clone(),
        body_size: response.body.len(),
        body_text: body_text(response),
        revalidating,
    }
}

fn body_text(response: &Response) -> Option<String> {
    let content_type = response.content_type()?.to_ascii_lowercase();
    let textual = content_type.starts_with("text/")
        || ["json", "xml", "svg", "javascript"].iter().any(|t| content_type.contains(t));
    if !textual || response.body.len() > MAX_TEXT_BODY {
        return None;
    }
    std::str::from_utf8(&response.body).ok().map(str::to_string)
}
