//! Request tagging and response logging for the API router.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const TARGET: &str = "quire::http::response";

/// Per-request data shared between the middleware and the auth extractors.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    author_id: Arc<OnceLock<i64>>,
}

impl RequestContext {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            author_id: Arc::default(),
        }
    }

    /// Remember the author a bearer token resolved to. The first call wins.
    pub fn record_author(&self, author_id: i64) {
        let _ = self.author_id.set(author_id);
    }

    pub fn author_id(&self) -> Option<i64> {
        self.author_id.get().copied()
    }
}

/// Reuse a caller-supplied `x-request-id` when it is printable, otherwise mint
/// one; either way it is echoed on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext::new(request_id);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();
    let ctx = request.extensions().get::<RequestContext>().cloned();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    counter!("quire_http_responses_total", "class" => status_class(status)).increment(1);

    let request_id = ctx
        .as_ref()
        .map(|ctx| ctx.request_id.as_str())
        .unwrap_or_default();
    // Recorded by the auth extractors while the handler ran.
    let author_id = ctx.as_ref().and_then(RequestContext::author_id);

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            request_id,
            author_id,
            "request handled",
        );
        return response;
    }

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    if status.is_server_error() {
        error!(
            target = TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            chain = ?messages,
            request_id,
            author_id,
            "request failed",
        );
    } else {
        warn!(
            target = TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            request_id,
            author_id,
            "client request error",
        );
    }

    response
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
