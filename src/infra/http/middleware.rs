//! Request id propagation and failure logging.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const SOURCE: &str = "pressroom::http::response";
const MAX_REQUEST_ID_LEN: usize = 128;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Identity of one request, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    /// Reuse a caller supplied id when it is short and printable, otherwise mint one.
    fn for_request(request: &Request<Body>) -> Self {
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= MAX_REQUEST_ID_LEN
                    && id.chars().all(|ch| ch.is_ascii_graphic())
            })
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self { request_id }
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::for_request(&request);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        log_failure(
            status,
            &method,
            &uri,
            &request_id,
            started_at.elapsed().as_millis() as u64,
            report,
        );
    }

    response
}

fn log_failure(
    status: StatusCode,
    method: &Method,
    uri: &Uri,
    request_id: &str,
    elapsed_ms: u64,
    report: Option<ErrorReport>,
) {
    let (source, chain) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic available");
    // The query can carry the source url, which is useful when URL mode fails.
    let query = uri.query().unwrap_or("");

    if status.is_server_error() {
        error!(
            target = SOURCE,
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query,
            request_id,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            "request failed"
        );
    } else {
        warn!(
            target = SOURCE,
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query,
            request_id,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            "request rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn request_with(id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(id) = id {
            builder = builder.header("x-request-id", id);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[test]
    fn caller_request_id_is_reused() {
        let ctx = RequestContext::for_request(&request_with(Some("job-42")));
        assert_eq!(ctx.request_id, "job-42");
    }

    #[test]
    fn missing_or_unusable_ids_are_replaced() {
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        for id in [None, Some(""), Some("has space"), Some(long.as_str())] {
            let ctx = RequestContext::for_request(&request_with(id));
            assert!(Uuid::parse_str(&ctx.request_id).is_ok(), "{id:?}");
        }
    }
}
