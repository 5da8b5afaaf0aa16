//! Multipart part taxonomy and the ordered set of parts staged for one request.

use std::path::{Path, PathBuf};

const DOCUMENT_NAME: &str = "html";
const STYLE_NAME: &str = "css";
const ATTACHMENT_PREFIX: &str = "attachment.";
const ASSET_PREFIX: &str = "asset.";

/// Role of an accepted multipart part, derived from its field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    /// The `html` part: the document to render.
    Document,
    /// The `css` part: replaces the built-in page style.
    Style,
    /// An `attachment.<key>` part, embedded into the output as a file attachment.
    Attachment { key: String },
    /// An `asset.<key>` part, only reachable through references in the document.
    Asset { key: String },
}

impl PartKind {
    /// Classify a field name. Unknown names yield `None` and are skipped by callers.
    pub fn classify(name: &str) -> Option<Self> {
        match name {
            DOCUMENT_NAME => Some(Self::Document),
            STYLE_NAME => Some(Self::Style),
            _ => {
                if let Some(key) = name.strip_prefix(ATTACHMENT_PREFIX) {
                    Some(Self::Attachment {
                        key: key.to_string(),
                    })
                } else {
                    name.strip_prefix(ASSET_PREFIX).map(|key| Self::Asset {
                        key: key.to_string(),
                    })
                }
            }
        }
    }
}

/// One uploaded part persisted inside the request workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPart {
    /// The multipart field name, e.g. `attachment.invoice`.
    pub name: String,
    pub kind: PartKind,
    /// Filename declared by the client, before sanitising.
    pub original_filename: Option<String>,
    pub path: PathBuf,
}

/// Parts staged for a request, keyed by field name in first-arrival order.
///
/// Re-staging a name replaces the earlier entry in place, so the last upload wins while
/// the position of the first one is kept.
#[derive(Debug, Clone, Default)]
pub struct StagedParts {
    parts: Vec<StagedPart>,
}

impl StagedParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a part, returning the entry it replaced if the name was already staged.
    pub fn insert(&mut self, part: StagedPart) -> Option<StagedPart> {
        match self.parts.iter_mut().find(|existing| existing.name == part.name) {
            Some(existing) => Some(std::mem::replace(existing, part)),
            None => {
                self.parts.push(part);
                None
            }
        }
    }

    pub fn document(&self) -> Option<&StagedPart> {
        self.parts
            .iter()
            .find(|part| part.kind == PartKind::Document)
    }

    pub fn style(&self) -> Option<&StagedPart> {
        self.parts.iter().find(|part| part.kind == PartKind::Style)
    }

    /// Attachment parts in ingestion order.
    pub fn attachments(&self) -> impl Iterator<Item = &StagedPart> {
        self.parts
            .iter()
            .filter(|part| matches!(part.kind, PartKind::Attachment { .. }))
    }

    /// On-disk paths of every staged part regardless of role.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.parts.iter().map(|part| part.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Reduce a client-declared filename to a single path component.
///
/// Directory components and traversal segments are dropped so the staged file always
/// lands directly inside the workspace. Returns `None` when nothing usable remains.
pub fn sanitize_filename(declared: &str) -> Option<String> {
    let last = declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return None;
    }

    Some(last.to_string())
}
