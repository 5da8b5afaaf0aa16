//! Multipart ingestion into a request workspace.

use std::{io, path::Path};

use axum::http::StatusCode;
use axum_extra::extract::{
    Multipart,
    multipart::{Field, MultipartError},
};
use metrics::counter;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;

use crate::{
    domain::parts::{PartKind, StagedPart, StagedParts, sanitize_filename},
    infra::workspace::{Workspace, WorkspaceError, WorkspaceRoot},
};

use super::CHUNK_SIZE;

const SOURCE: &str = "infra::http::ingest";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("failed to read multipart payload")]
    Multipart {
        status: StatusCode,
        #[source]
        source: MultipartError,
    },
    #[error("failed to stage part `{name}`")]
    Stage {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("no `html` part was uploaded")]
    MissingDocument,
}

impl From<MultipartError> for IngestError {
    fn from(source: MultipartError) -> Self {
        Self::Multipart {
            status: source.status(),
            source,
        }
    }
}

/// Parts of one request, staged inside the workspace that owns them.
#[derive(Debug)]
pub struct Ingested {
    pub workspace: Workspace,
    pub parts: StagedParts,
}

/// Stream every recognised part of `multipart` into a fresh workspace.
///
/// The workspace is dropped, and removed, on every error path.
pub async fn ingest(
    multipart: &mut Multipart,
    workspaces: &WorkspaceRoot,
) -> Result<Ingested, IngestError> {
    let workspace = workspaces.create()?;
    let parts_dir = workspace.parts_dir();
    let mut parts = StagedParts::new();
    let mut ignored = 0usize;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let Some(kind) = PartKind::classify(&name) else {
            ignored += 1;
            counter!("pressroom_parts_ignored_total").increment(1);
            debug!(
                target = SOURCE,
                workspace_id = %workspace.id(),
                part = %name,
                "ignoring unrecognised part"
            );
            continue;
        };

        let original_filename = field.file_name().map(str::to_string);
        let filename = original_filename
            .as_deref()
            .and_then(sanitize_filename)
            .or_else(|| sanitize_filename(&name))
            .unwrap_or_else(|| "part".to_string());
        let path = parts_dir.join(&filename);

        let bytes = stage_field(field, &path).await.map_err(|err| match err {
            StageError::Multipart(source) => IngestError::from(source),
            StageError::Io(source) => IngestError::Stage {
                name: name.clone(),
                source,
            },
        })?;

        debug!(
            target = SOURCE,
            workspace_id = %workspace.id(),
            part = %name,
            filename = %filename,
            bytes,
            "part staged"
        );

        let replaced = parts.insert(StagedPart {
            name,
            kind,
            original_filename,
            path,
        });
        if let Some(previous) = replaced {
            debug!(
                target = SOURCE,
                workspace_id = %workspace.id(),
                part = %previous.name,
                "duplicate part replaced earlier upload"
            );
        }
    }

    if parts.document().is_none() {
        return Err(IngestError::MissingDocument);
    }

    debug!(
        target = SOURCE,
        workspace_id = %workspace.id(),
        staged = parts.len(),
        ignored,
        "multipart payload ingested"
    );
    Ok(Ingested { workspace, parts })
}

enum StageError {
    Multipart(MultipartError),
    Io(io::Error),
}

async fn stage_field(mut field: Field, path: &Path) -> Result<u64, StageError> {
    let file = File::create(path).await.map_err(StageError::Io)?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut total_bytes: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(StageError::Multipart)? {
        total_bytes = total_bytes.saturating_add(chunk.len() as u64);
        writer.write_all(&chunk).await.map_err(StageError::Io)?;
    }
    writer.flush().await.map_err(StageError::Io)?;

    Ok(total_bytes)
}
