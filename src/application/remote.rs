//! Source documents fetched by URL.
//!
//! The fetched document is staged into the request workspace and rendered like an upload,
//! so everything it references still goes through the resource access controller.

use std::{io, path::Path, time::Instant};

use reqwest::{Client, Url, redirect};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};

use crate::{
    config::RemoteSettings,
    domain::parts::{PartKind, StagedPart},
};

const SOURCE: &str = "application::remote";
const MAX_REDIRECTS: usize = 5;
const FETCHED_DOCUMENT: &str = "source.html";

#[derive(Debug, Error)]
pub enum RemoteFetchError {
    #[error("source url `{url}` is malformed")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("scheme `{scheme}` is not permitted for source documents")]
    SchemeNotPermitted { scheme: String },
    #[error("host `{host}` is not on the allowed host list")]
    HostNotPermitted { host: String },
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),
    #[error("request for `{url}` failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("`{url}` responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("source document exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("failed to stage source document")]
    Io(#[from] io::Error),
}

impl RemoteFetchError {
    /// Whether the URL itself was refused, as opposed to the fetch failing.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RemoteFetchError::InvalidUrl { .. }
                | RemoteFetchError::SchemeNotPermitted { .. }
                | RemoteFetchError::HostNotPermitted { .. }
        )
    }
}

/// Which source URLs may be fetched.
#[derive(Debug, Clone)]
struct UrlPolicy {
    allowed_hosts: Vec<String>,
}

impl UrlPolicy {
    fn check(&self, url: &Url) -> Result<(), RemoteFetchError> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(RemoteFetchError::SchemeNotPermitted {
                    scheme: scheme.to_string(),
                });
            }
        }

        let host = url.host_str().unwrap_or_default();
        if host.is_empty() {
            return Err(RemoteFetchError::HostNotPermitted {
                host: String::new(),
            });
        }
        if self.allowed_hosts.is_empty()
            || self
                .allowed_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host))
        {
            Ok(())
        } else {
            Err(RemoteFetchError::HostNotPermitted {
                host: host.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
    policy: UrlPolicy,
    max_document_bytes: u64,
}

impl RemoteFetcher {
    pub fn new(settings: &RemoteSettings) -> Result<Self, RemoteFetchError> {
        let policy = UrlPolicy {
            allowed_hosts: settings.allowed_hosts.clone(),
        };

        // Redirects are held to the same host policy as the initial request.
        let redirect_policy = {
            let policy = policy.clone();
            redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if policy.check(attempt.url()).is_ok() {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            })
        };

        let client = Client::builder()
            .user_agent(concat!("pressroom/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.connect_timeout)
            .redirect(redirect_policy)
            .build()
            .map_err(RemoteFetchError::Client)?;

        Ok(Self {
            client,
            policy,
            max_document_bytes: settings.max_document_bytes,
        })
    }

    /// Validate `raw` against the scheme and host policy.
    pub fn parse(&self, raw: &str) -> Result<Url, RemoteFetchError> {
        let url = Url::parse(raw.trim()).map_err(|source| RemoteFetchError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;
        self.policy.check(&url)?;
        Ok(url)
    }

    /// Download `url` into `parts_dir` and describe it as the request's document part.
    pub async fn fetch(&self, url: &Url, parts_dir: &Path) -> Result<StagedPart, RemoteFetchError> {
        let started_at = Instant::now();
        let request_error = |source| RemoteFetchError::Request {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target = SOURCE,
                op = "remote::fetch",
                result = "error",
                url = %url,
                status = status.as_u16(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "source document request was not successful"
            );
            return Err(RemoteFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|length| length > self.max_document_bytes)
        {
            return Err(RemoteFetchError::TooLarge {
                limit: self.max_document_bytes,
            });
        }

        let path = parts_dir.join(FETCHED_DOCUMENT);
        let mut file = fs::File::create(&path).await?;
        let mut total_bytes: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            total_bytes = total_bytes.saturating_add(chunk.len() as u64);
            if total_bytes > self.max_document_bytes {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(RemoteFetchError::TooLarge {
                    limit: self.max_document_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!(
            target = SOURCE,
            op = "remote::fetch",
            result = "ok",
            url = %url,
            bytes = total_bytes,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "source document fetched"
        );

        Ok(StagedPart {
            name: "html".to_string(),
            kind: PartKind::Document,
            original_filename: url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
            path,
        })
    }
}
