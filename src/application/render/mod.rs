//! Render orchestration.
//!
//! Turns the staged parts of one request into a [`RenderJob`], binds a
//! [`ResourceAccessController`] to every staged path, and hands both to the configured
//! [`Renderer`]. Failures are logged with their full chain here; callers only learn that
//! rendering failed.

mod command;
mod linker;
mod types;

use std::{error::Error as StdError, path::PathBuf, sync::Arc, time::Instant};

use metrics::{counter, histogram};
use tracing::{debug, error, info};

use crate::{
    application::access::ResourceAccessController, domain::parts::StagedParts,
    infra::workspace::Workspace,
};

pub use command::CommandRenderer;
pub use types::{RenderError, RenderJob, Renderer, StyleSource};

const SOURCE: &str = "application::render";

/// Page setup used when the request carries no style sheet.
pub const DEFAULT_PAGE_STYLE: &str = "@page { size: A4; margin: 2cm 2.5cm; }";

/// File name of the artifact inside the workspace render directory.
pub const OUTPUT_FILENAME: &str = "output.pdf";

/// How the document reached the service; used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Upload,
    Url,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Upload => "upload",
            RenderMode::Url => "url",
        }
    }
}

#[derive(Clone)]
pub struct RenderService {
    renderer: Arc<dyn Renderer>,
}

impl RenderService {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }

    /// Render the staged parts of `workspace` and return the artifact path.
    pub async fn render(
        &self,
        parts: &StagedParts,
        workspace: &Workspace,
        mode: RenderMode,
    ) -> Result<PathBuf, RenderError> {
        let started_at = Instant::now();
        let result = self.render_inner(parts, workspace).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        histogram!("pressroom_render_ms", "mode" => mode.as_str()).record(elapsed_ms as f64);

        match &result {
            Ok(output) => {
                counter!(
                    "pressroom_render_total",
                    "outcome" => "success",
                    "mode" => mode.as_str()
                )
                .increment(1);
                info!(
                    target = SOURCE,
                    workspace_id = %workspace.id(),
                    mode = mode.as_str(),
                    parts = parts.len(),
                    elapsed_ms,
                    output = %output.display(),
                    "document rendered"
                );
            }
            Err(err) => {
                counter!(
                    "pressroom_render_total",
                    "outcome" => "failure",
                    "mode" => mode.as_str()
                )
                .increment(1);
                error!(
                    target = SOURCE,
                    workspace_id = %workspace.id(),
                    mode = mode.as_str(),
                    elapsed_ms,
                    error = %err,
                    chain = ?error_chain(err),
                    "document rendering failed"
                );
            }
        }

        result
    }

    async fn render_inner(
        &self,
        parts: &StagedParts,
        workspace: &Workspace,
    ) -> Result<PathBuf, RenderError> {
        let job = build_job(parts, workspace)?;
        // Canonicalising the allow-list touches the filesystem.
        let paths: Vec<PathBuf> = parts.paths().map(PathBuf::from).collect();
        let parts_dir = workspace.parts_dir();
        let controller = tokio::task::spawn_blocking(move || {
            ResourceAccessController::new(paths).with_base_dir(parts_dir)
        })
        .await
        .map_err(|err| RenderError::Task(err.to_string()))?;
        debug!(
            target = SOURCE,
            workspace_id = %workspace.id(),
            allowed = controller.allowed_len(),
            attachments = job.attachments.len(),
            "resource allow-list bound"
        );
        self.renderer.render(job, Arc::new(controller)).await
    }
}

/// Map staged parts onto renderer inputs.
pub fn build_job(parts: &StagedParts, workspace: &Workspace) -> Result<RenderJob, RenderError> {
    let document = parts
        .document()
        .map(|part| part.path.clone())
        .ok_or(RenderError::MissingDocument)?;

    let stylesheets = match parts.style() {
        Some(style) => vec![StyleSource::File(style.path.clone())],
        None => vec![StyleSource::Inline(DEFAULT_PAGE_STYLE.to_string())],
    };

    let attachments = parts
        .attachments()
        .map(|part| part.path.clone())
        .collect();

    let scratch_dir = workspace.render_dir();
    Ok(RenderJob {
        document,
        stylesheets,
        attachments,
        output: scratch_dir.join(OUTPUT_FILENAME),
        scratch_dir,
    })
}

fn error_chain(err: &dyn StdError) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut current = err.source();
    while let Some(inner) = current {
        chain.push(inner.to_string());
        current = inner.source();
    }
    chain
}
