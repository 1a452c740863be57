use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// How `/blog/more` answered, attached to its response for the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadMoreTrace {
    pub start: usize,
    pub mode: LoadMoreMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMoreMode {
    /// Rows appended over SSE.
    Append,
    /// Fetch failed; SSE loader offers the same range again.
    Retry,
    /// Full page for a client without datastar.
    Page,
}

impl LoadMoreMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadMoreMode::Append => "append",
            LoadMoreMode::Retry => "retry",
            LoadMoreMode::Page => "page",
        }
    }
}

/// Tag the request with an id, reusing a well-formed `x-request-id` from the client.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::new_v4)
        .to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if let Some(trace) = response.extensions().get::<LoadMoreTrace>() {
        debug!(
            target = "travelora::http::load_more",
            status = status.as_u16(),
            start = trace.start,
            mode = trace.mode.as_str(),
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "load more served",
        );
    }

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "travelora::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "travelora::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}
