//! Classification of resource locators requested while rendering.

use std::path::PathBuf;

use url::{ParseError, Url};

/// The shape of a resource locator, before any access decision is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A self-contained `data:` URI.
    Data,
    /// A local filesystem path, either scheme-less or `file:`. May be relative.
    Local(PathBuf),
    /// Anything else: network schemes, or a `file:` locator without a path.
    External { scheme: String },
}

impl Locator {
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        match Url::parse(raw) {
            Ok(url) => match url.scheme() {
                "data" => Self::Data,
                "file" => classify_file_url(raw, &url),
                scheme => Self::External {
                    scheme: scheme.to_string(),
                },
            },
            Err(ParseError::RelativeUrlWithoutBase) => {
                let path = strip_query_and_fragment(raw);
                if path.is_empty() {
                    Self::External {
                        scheme: String::new(),
                    }
                } else {
                    Self::Local(PathBuf::from(path))
                }
            }
            Err(_) => Self::External {
                scheme: String::new(),
            },
        }
    }
}

fn classify_file_url(raw: &str, url: &Url) -> Locator {
    let no_path = Locator::External {
        scheme: "file".to_string(),
    };

    // `Url` normalises `file://` to a path of `/`, so emptiness is checked on the raw text.
    let after_scheme = raw.get(5..).unwrap_or_default();
    let path_part = match after_scheme.strip_prefix("//") {
        Some(authority_and_path) => authority_and_path
            .find('/')
            .map(|index| &authority_and_path[index..])
            .unwrap_or_default(),
        None => after_scheme,
    };
    if strip_query_and_fragment(path_part).is_empty() {
        return no_path;
    }

    match url.to_file_path() {
        Ok(path) => Locator::Local(path),
        Err(()) => no_path,
    }
}

fn strip_query_and_fragment(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}
