use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use axum_extra::extract::{Multipart, multipart::MultipartRejection};
use serde::Deserialize;

use crate::{
    application::{
        error::HttpError,
        remote::RemoteFetchError,
        render::{OUTPUT_FILENAME, RenderMode},
    },
    domain::parts::StagedParts,
};

use super::{
    AppState, BODY_TOO_LARGE, FETCH_FAILED, INVALID_MULTIPART, MISSING_URL, MULTIPART_REQUIRED,
    NO_HTML, PDF_CONTENT_TYPE, RENDER_FAILED, URL_NOT_PERMITTED,
    ingest::{IngestError, ingest},
    stream::{Disposition, stream_artifact},
};

#[derive(Debug, Default, Deserialize)]
pub(super) struct RenderQuery {
    url: Option<String>,
    output: Option<String>,
    inline: Option<String>,
}

impl RenderQuery {
    fn disposition(&self) -> Disposition {
        match self.inline.as_deref() {
            Some("true") => Disposition::Inline,
            _ => Disposition::Attachment,
        }
    }
}

pub(super) async fn render_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::render_upload";

    let mut multipart = multipart.map_err(|rejection| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            MULTIPART_REQUIRED,
            rejection.to_string(),
        )
    })?;

    let ingested = ingest(&mut multipart, &state.workspaces)
        .await
        .map_err(ingest_error_to_http)?;

    let artifact = state
        .render
        .render(&ingested.parts, &ingested.workspace, RenderMode::Upload)
        .await
        .map_err(|err| {
            HttpError::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, RENDER_FAILED, &err)
        })?;

    stream_artifact(
        ingested.workspace,
        &artifact,
        PDF_CONTENT_TYPE,
        OUTPUT_FILENAME,
        Disposition::Attachment,
    )
    .await
}

pub(super) async fn render_url(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::render_url";

    let raw_url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                MISSING_URL,
                "query parameter `url` is missing",
            )
        })?;

    let url = state
        .remote
        .parse(raw_url)
        .map_err(|err| remote_error_to_http(SOURCE, &err))?;

    let workspace = state.workspaces.create().map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, RENDER_FAILED, &err)
    })?;

    let document = state
        .remote
        .fetch(&url, &workspace.parts_dir())
        .await
        .map_err(|err| remote_error_to_http(SOURCE, &err))?;

    let mut parts = StagedParts::new();
    parts.insert(document);

    let artifact = state
        .render
        .render(&parts, &workspace, RenderMode::Url)
        .await
        .map_err(|err| {
            HttpError::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, RENDER_FAILED, &err)
        })?;

    let filename = query.output.as_deref().unwrap_or(OUTPUT_FILENAME);
    stream_artifact(
        workspace,
        &artifact,
        PDF_CONTENT_TYPE,
        filename,
        query.disposition(),
    )
    .await
}

pub(super) async fn healthcheck() -> &'static str {
    "OK"
}

fn ingest_error_to_http(err: IngestError) -> HttpError {
    const SOURCE: &str = "infra::http::ingest_error_to_http";

    match &err {
        IngestError::MissingDocument => {
            HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, NO_HTML, &err)
        }
        IngestError::Multipart { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
            HttpError::from_error(SOURCE, StatusCode::PAYLOAD_TOO_LARGE, BODY_TOO_LARGE, &err)
        }
        IngestError::Multipart { .. } => {
            HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, INVALID_MULTIPART, &err)
        }
        IngestError::Workspace(_) | IngestError::Stage { .. } => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            RENDER_FAILED,
            &err,
        ),
    }
}

fn remote_error_to_http(source: &'static str, err: &RemoteFetchError) -> HttpError {
    if err.is_rejection() {
        HttpError::from_error(source, StatusCode::BAD_REQUEST, URL_NOT_PERMITTED, err)
    } else if matches!(err, RemoteFetchError::Io(_)) {
        HttpError::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, RENDER_FAILED, err)
    } else {
        HttpError::from_error(source, StatusCode::BAD_GATEWAY, FETCH_FAILED, err)
    }
}
