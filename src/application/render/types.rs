use std::{io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::application::access::{AccessError, ResourceResolver};

/// One style sheet handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSource {
    /// A style sheet file staged for the request.
    File(PathBuf),
    /// Style sheet text supplied by the service itself.
    Inline(String),
}

/// Inputs for a single renderer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// The HTML document to render.
    pub document: PathBuf,
    pub stylesheets: Vec<StyleSource>,
    /// Files embedded into the output as attachments, in order.
    pub attachments: Vec<PathBuf>,
    /// Where the artifact must be written.
    pub output: PathBuf,
    /// Private directory for intermediate files. Removed with the request workspace.
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no document part was staged")]
    MissingDocument,
    #[error("resource resolution failed")]
    Resource(#[from] AccessError),
    #[error("style sheet imports nest deeper than {max_depth} levels")]
    ImportDepth { max_depth: usize },
    #[error("document could not be processed: {reason}")]
    InvalidDocument { reason: String },
    #[error("failed to spawn renderer `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("renderer exited unsuccessfully (exit {exit_code:?}): {stderr}")]
    Engine {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("renderer did not produce `{}`", path.display())]
    MissingOutput { path: PathBuf },
    #[error("renderer i/o failure")]
    Io(#[from] io::Error),
    #[error("renderer task failed: {0}")]
    Task(String),
}

impl RenderError {
    /// The access error behind this failure, if a resource was refused.
    pub fn access_error(&self) -> Option<&AccessError> {
        match self {
            RenderError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

/// External document renderer.
///
/// Implementations must obtain every resource the document and its style sheets refer to
/// through `resolver`, and fail the render when resolution fails.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        job: RenderJob,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Result<PathBuf, RenderError>;
}
