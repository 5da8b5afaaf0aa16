use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Instant,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::access::ResourceResolver;

use super::{
    linker::{Linker, file_base},
    types::{RenderError, RenderJob, Renderer, StyleSource},
};

const SOURCE: &str = "application::render::command";
const LINKED_DOCUMENT: &str = "document.html";
const GUARD_SCRIPT_NAME: &str = "guard.py";
/// Runs WeasyPrint with a fetcher that refuses everything but `data:` URLs and the
/// prepared inputs, so a reference the linker did not rewrite still cannot be read.
const GUARD_SCRIPT: &str = include_str!("guard.py");

/// Renderer driving a WeasyPrint-compatible command line tool.
///
/// The document and its style sheets are linked through the resolver before the process
/// starts, so the tool only ever sees self-contained input.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    guarded: bool,
}

/// Inputs rewritten into the scratch directory.
#[derive(Debug)]
struct PreparedJob {
    guard: Option<PathBuf>,
    document: PathBuf,
    stylesheets: Vec<PathBuf>,
    attachments: Vec<PathBuf>,
}

impl CommandRenderer {
    /// Invoke `program` directly with the WeasyPrint command line.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            guarded: false,
        }
    }

    /// Run WeasyPrint as a library through `python`, behind a fetcher that only serves
    /// `data:` URLs and the prepared inputs.
    pub fn guarded(python: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: python.into(),
            args,
            guarded: true,
        }
    }

    pub fn is_guarded(&self) -> bool {
        self.guarded
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, prepared: &PreparedJob, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(guard) = &prepared.guard {
            command.arg(guard);
        }
        command.args(&self.args);
        for stylesheet in &prepared.stylesheets {
            command.arg("--stylesheet").arg(stylesheet);
        }
        for attachment in &prepared.attachments {
            command.arg("--attachment").arg(attachment);
        }
        command
            .arg(&prepared.document)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(
        &self,
        job: RenderJob,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Result<PathBuf, RenderError> {
        let started_at = Instant::now();
        let output = job.output.clone();

        let guarded = self.guarded;
        let prepared =
            tokio::task::spawn_blocking(move || prepare(&job, resolver.as_ref(), guarded))
            .await
            .map_err(|err| RenderError::Task(err.to_string()))??;

        let cli_started_at = Instant::now();
        let result = self
            .command(&prepared, &output)
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = SOURCE,
                    op = "command::render",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    program = %self.program,
                    error = %err,
                    "Failed to spawn renderer"
                );
                RenderError::Spawn {
                    program: self.program.clone(),
                    source: err,
                }
            })?;

        if !result.status.success() {
            let exit_code = result.status.code();
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!(
                target = SOURCE,
                op = "command::render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "renderer_cli",
                stderr = %stderr,
                "Renderer invocation failed"
            );
            return Err(RenderError::Engine { exit_code, stderr });
        }

        let pdf_bytes = match tokio::fs::metadata(&output).await {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            Ok(_) => return Err(RenderError::MissingOutput { path: output }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RenderError::MissingOutput { path: output });
            }
            Err(err) => return Err(RenderError::Io(err)),
        };

        info!(
            target = SOURCE,
            op = "command::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
            stylesheets = prepared.stylesheets.len(),
            attachments = prepared.attachments.len(),
            pdf_bytes,
            "Document rendered via CLI"
        );

        Ok(output)
    }
}

fn prepare(
    job: &RenderJob,
    resolver: &dyn ResourceResolver,
    guarded: bool,
) -> Result<PreparedJob, RenderError> {
    let linker = Linker::new(resolver);

    let document_base = file_base(&job.document)?;
    let document = resolver.resolve(document_base.as_str())?;
    let html = String::from_utf8_lossy(&document.bytes);
    let linked = linker.link_document(&html, &document_base)?;
    let document_path = job.scratch_dir.join(LINKED_DOCUMENT);
    std::fs::write(&document_path, linked)?;

    let mut stylesheets = Vec::with_capacity(job.stylesheets.len());
    for (index, style) in job.stylesheets.iter().enumerate() {
        let linked = match style {
            StyleSource::File(path) => {
                let base = file_base(path)?;
                let resolved = resolver.resolve(base.as_str())?;
                linker.link_stylesheet(&String::from_utf8_lossy(&resolved.bytes), &base, 0)?
            }
            StyleSource::Inline(css) => linker.link_stylesheet(css, &document_base, 0)?,
        };
        let path = job.scratch_dir.join(format!("style-{index}.css"));
        std::fs::write(&path, linked)?;
        stylesheets.push(path);
    }

    for attachment in &job.attachments {
        resolver.resolve(file_base(attachment)?.as_str())?;
    }

    let guard = if guarded {
        let path = job.scratch_dir.join(GUARD_SCRIPT_NAME);
        std::fs::write(&path, GUARD_SCRIPT)?;
        Some(path)
    } else {
        None
    };

    Ok(PreparedJob {
        guard,
        document: document_path,
        stylesheets,
        attachments: job.attachments.clone(),
    })
}
