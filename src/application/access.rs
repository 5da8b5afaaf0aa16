//! Resource access control for documents rendered on behalf of a request.
//!
//! The renderer asks a [`ResourceResolver`] for every resource a document or style sheet
//! references. [`ResourceAccessController`] answers with the bytes of `data:` URIs and of
//! files staged for the same request, and refuses everything else: other local files,
//! traversal attempts and any network scheme.

use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::locator::Locator;

const SOURCE: &str = "application::access";
const DEFAULT_DATA_MIME: &str = "text/plain;charset=US-ASCII";

/// Errors produced while resolving a resource locator.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("resource not permitted: `{locator}`")]
    NotPermitted { locator: String },
    #[error("external resource not permitted: `{locator}`")]
    ExternalNotPermitted { locator: String },
    #[error("malformed data URI: {reason}")]
    MalformedData { reason: String },
    #[error("failed to read resource `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AccessError {
    /// True for decisions made by the access policy, as opposed to loader failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotPermitted { .. } | Self::ExternalNotPermitted { .. }
        )
    }
}

/// Bytes of a resolved resource with the MIME type the loader determined for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Resolution callback handed to renderers.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, locator: &str) -> Result<ResolvedResource, AccessError>;
}

/// Loads resources without applying any policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoader;

impl DefaultLoader {
    /// Decode a `data:` URI (RFC 2397), base64 or percent-encoded.
    pub fn load_data(&self, uri: &str) -> Result<ResolvedResource, AccessError> {
        let malformed = |reason: &str| AccessError::MalformedData {
            reason: reason.to_string(),
        };

        let trimmed = uri.trim();
        let rest = match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("data:") => &trimmed[5..],
            _ => return Err(malformed("missing `data:` prefix")),
        };
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| malformed("missing `,` separator"))?;

        let mut is_base64 = false;
        let mut essence = String::new();
        let mut parameters = Vec::new();
        for (index, segment) in header.split(';').enumerate() {
            let segment = segment.trim();
            if segment.eq_ignore_ascii_case("base64") {
                is_base64 = true;
            } else if index == 0 {
                essence = segment.to_ascii_lowercase();
            } else if !segment.is_empty() {
                parameters.push(segment);
            }
        }
        let mime_type = match (essence.is_empty(), parameters.is_empty()) {
            (true, true) => DEFAULT_DATA_MIME.to_string(),
            (true, false) => format!("text/plain;{}", parameters.join(";")),
            (false, true) => essence,
            (false, false) => format!("{essence};{}", parameters.join(";")),
        };

        let decoded = percent_decode(payload);
        let bytes = if is_base64 {
            let compact: Vec<u8> = decoded
                .into_iter()
                .filter(|byte| !byte.is_ascii_whitespace())
                .collect();
            let engine = if compact.len() % 4 == 0 {
                &STANDARD
            } else {
                &STANDARD_NO_PAD
            };
            engine
                .decode(&compact)
                .map_err(|err| malformed(&format!("invalid base64 payload: {err}")))?
        } else {
            decoded
        };

        Ok(ResolvedResource {
            mime_type,
            bytes: Bytes::from(bytes),
        })
    }

    /// Read a file into memory, guessing its MIME type from the extension.
    pub fn load_file(&self, path: &Path) -> Result<ResolvedResource, AccessError> {
        let bytes = std::fs::read(path).map_err(|source| AccessError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(ResolvedResource {
            mime_type,
            bytes: Bytes::from(bytes),
        })
    }
}

/// Per-request access policy: `data:` URIs plus an immutable set of canonical paths.
#[derive(Debug, Clone)]
pub struct ResourceAccessController {
    allowed: HashSet<PathBuf>,
    base_dir: Option<PathBuf>,
    loader: DefaultLoader,
}

impl ResourceAccessController {
    /// Build the allow-list from the staged paths of one request.
    ///
    /// Paths that cannot be canonicalised (for example because they were removed) are
    /// left out, which denies access to them.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let allowed = paths
            .into_iter()
            .filter_map(|path| {
                let path = path.as_ref();
                match std::fs::canonicalize(path) {
                    Ok(canonical) => Some(canonical),
                    Err(err) => {
                        warn!(
                            target = SOURCE,
                            path = %path.display(),
                            error = %err,
                            "staged path could not be canonicalised; excluding from allow-list"
                        );
                        None
                    }
                }
            })
            .collect();

        Self {
            allowed,
            base_dir: None,
            loader: DefaultLoader,
        }
    }

    /// Directory that scheme-less relative paths are resolved against.
    ///
    /// Without one, relative paths resolve against the process working directory.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Whether the canonical form of `path` is on the allow-list.
    pub fn permits(&self, path: &Path) -> bool {
        std::fs::canonicalize(path)
            .map(|canonical| self.allowed.contains(&canonical))
            .unwrap_or(false)
    }

    pub fn allowed_len(&self) -> usize {
        self.allowed.len()
    }

    fn resolve_local(&self, locator: &str, path: PathBuf) -> Result<ResolvedResource, AccessError> {
        let candidate = match (&self.base_dir, path.is_relative()) {
            (Some(base), true) => base.join(path),
            _ => path,
        };

        let canonical = std::fs::canonicalize(&candidate)
            .ok()
            .filter(|canonical| self.allowed.contains(canonical))
            .ok_or_else(|| {
                reject("not_permitted", locator);
                AccessError::NotPermitted {
                    locator: locator.to_string(),
                }
            })?;

        debug!(
            target = SOURCE,
            locator,
            path = %canonical.display(),
            "resource resolved from allow-list"
        );
        self.loader.load_file(&canonical)
    }
}

impl ResourceResolver for ResourceAccessController {
    fn resolve(&self, locator: &str) -> Result<ResolvedResource, AccessError> {
        match Locator::classify(locator) {
            Locator::Data => self.loader.load_data(locator),
            Locator::Local(path) => self.resolve_local(locator, path),
            Locator::External { .. } => {
                reject("external", locator);
                Err(AccessError::ExternalNotPermitted {
                    locator: locator.to_string(),
                })
            }
        }
    }
}

fn reject(reason: &'static str, locator: &str) {
    counter!("pressroom_resource_rejected_total", "reason" => reason).increment(1);
    warn!(
        target = SOURCE,
        reason,
        locator = truncate_locator(locator),
        "resource access rejected"
    );
}

// Long data-bearing locators only need a recognisable prefix in logs.
fn truncate_locator(locator: &str) -> &str {
    const MAX: usize = 256;
    if locator.len() <= MAX {
        return locator;
    }
    let mut end = MAX;
    while !locator.is_char_boundary(end) {
        end -= 1;
    }
    &locator[..end]
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%'
            && index + 2 < bytes.len()
            && let (Some(high), Some(low)) = (
                hex_value(bytes[index + 1]),
                hex_value(bytes[index + 2]),
            )
        {
            output.push(high << 4 | low);
            index += 3;
            continue;
        }
        output.push(bytes[index]);
        index += 1;
    }
    output
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
