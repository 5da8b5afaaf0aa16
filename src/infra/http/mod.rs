//! HTTP surface: router, middleware, multipart ingestion and artifact streaming.

mod ingest;
mod middleware;
mod render;
mod stream;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::get,
};

use crate::{
    application::{remote::RemoteFetcher, render::RenderService},
    infra::workspace::WorkspaceRoot,
};

pub use ingest::{IngestError, Ingested, ingest};
pub use middleware::RequestContext;
pub use stream::{Disposition, header_filename, stream_artifact};

/// Size of the chunks used to stage uploads and stream artifacts.
pub const CHUNK_SIZE: usize = 64 * 1024;

pub(crate) const PDF_CONTENT_TYPE: &str = "application/pdf";

pub(crate) const MULTIPART_REQUIRED: &str = "Multipart request required.";
pub(crate) const NO_HTML: &str = "No html file provided.";
pub(crate) const INVALID_MULTIPART: &str = "Invalid multipart payload.";
pub(crate) const BODY_TOO_LARGE: &str = "Request body too large.";
pub(crate) const RENDER_FAILED: &str = "PDF generation failed.";
pub(crate) const MISSING_URL: &str = "Missing url parameter.";
pub(crate) const URL_NOT_PERMITTED: &str = "Source URL not permitted.";
pub(crate) const FETCH_FAILED: &str = "Source document could not be fetched.";

#[derive(Clone)]
pub struct AppState {
    pub render: Arc<RenderService>,
    pub workspaces: Arc<WorkspaceRoot>,
    pub remote: Arc<RemoteFetcher>,
}

/// Build the service router; `body_limit` caps multipart request bodies.
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(render::render_url).post(render::render_upload))
        .route("/healthcheck", get(render::healthcheck))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
