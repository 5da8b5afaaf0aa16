//! Streams a rendered artifact to the client in bounded chunks.

use std::{io, path::Path};

use async_stream::stream;
use axum::{
    body::Body,
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};
use bytes::{Bytes, BytesMut};
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{debug, warn};

use crate::{application::error::HttpError, infra::workspace::Workspace};

use super::{CHUNK_SIZE, RENDER_FAILED};

const SOURCE: &str = "infra::http::stream";
const DEFAULT_FILENAME: &str = "output.pdf";

/// How the client should present the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

/// Build a response that streams `path` and owns `workspace` until the body finishes.
///
/// Dropping the body, whether it completed or the client went away, removes the workspace.
pub async fn stream_artifact(
    workspace: Workspace,
    path: &Path,
    content_type: &'static str,
    filename: &str,
    disposition: Disposition,
) -> Result<Response, HttpError> {
    let open_error = |err: &io::Error| {
        HttpError::from_error(
            "infra::http::stream_artifact",
            StatusCode::INTERNAL_SERVER_ERROR,
            RENDER_FAILED,
            err,
        )
    };
    let mut file = File::open(path).await.map_err(|err| open_error(&err))?;
    let length = file
        .metadata()
        .await
        .map_err(|err| open_error(&err))?
        .len();

    let body = stream! {
        let workspace = workspace;
        let mut sent: u64 = 0;
        loop {
            let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
            match file.read_buf(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => {
                    sent += read as u64;
                    yield Ok::<Bytes, io::Error>(buffer.freeze());
                }
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        workspace_id = %workspace.id(),
                        error = %err,
                        "failed to read artifact mid-stream"
                    );
                    yield Err(err);
                    break;
                }
            }
        }
        debug!(
            target = SOURCE,
            workspace_id = %workspace.id(),
            bytes = sent,
            "artifact streamed"
        );
    };

    let disposition = format!(
        "{}; filename=\"{}\"",
        disposition.as_str(),
        header_filename(filename)
    );
    let disposition = HeaderValue::from_str(&disposition).map_err(|err| {
        HttpError::new(
            "infra::http::stream_artifact",
            StatusCode::INTERNAL_SERVER_ERROR,
            RENDER_FAILED,
            err.to_string(),
        )
    })?;

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(CONTENT_DISPOSITION, disposition);
    Ok(response)
}

/// Reduce a client supplied name to something safe inside a quoted header parameter.
pub fn header_filename(requested: &str) -> String {
    let cleaned: String = requested
        .chars()
        .filter(|ch| ch.is_ascii_graphic() || *ch == ' ')
        .filter(|ch| !matches!(ch, '"' | '\\' | '/' | ';'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}
