//! Shared fixtures for router-level tests.
#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header::CONTENT_TYPE},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use pressroom::{
    application::{
        access::ResourceResolver,
        remote::RemoteFetcher,
        render::{RenderError, RenderJob, RenderService, Renderer},
    },
    config::RemoteSettings,
    infra::{
        http::{AppState, build_router},
        workspace::WorkspaceRoot,
    },
};
use regex::Regex;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "pressroom-test-boundary";

static SRC_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src=['"]([^'"]*)['"]"#).expect("src pattern"));

/// Deterministic renderer: resolves every `src` reference and echoes what it saw.
#[derive(Default)]
pub struct StubRenderer {
    jobs: Mutex<Vec<RenderJob>>,
}

impl StubRenderer {
    pub fn jobs(&self) -> Vec<RenderJob> {
        self.jobs.lock().expect("jobs lock").clone()
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(
        &self,
        job: RenderJob,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Result<PathBuf, RenderError> {
        self.jobs.lock().expect("jobs lock").push(job.clone());

        let html = tokio::fs::read_to_string(&job.document).await?;
        let mut output = b"%PDF-1.7\n".to_vec();
        for reference in SRC_ATTRIBUTE.captures_iter(&html) {
            let resolved = resolver.resolve(&reference[1])?;
            output.extend_from_slice(resolved.mime_type.as_bytes());
            output.push(b'\n');
        }
        output.extend_from_slice(html.as_bytes());

        tokio::fs::write(&job.output, output).await?;
        Ok(job.output)
    }
}

pub struct TestApp {
    pub router: Router,
    pub root: TempDir,
}

impl TestApp {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self::with_limits(renderer, 1024 * 1024, &[])
    }

    pub fn with_limits(
        renderer: Arc<dyn Renderer>,
        body_limit: usize,
        allowed_hosts: &[&str],
    ) -> Self {
        let root = TempDir::new().expect("workspace root");
        let remote = RemoteFetcher::new(&RemoteSettings {
            allowed_hosts: allowed_hosts.iter().map(|host| host.to_string()).collect(),
            max_document_bytes: 64 * 1024,
            connect_timeout: Duration::from_secs(5),
        })
        .expect("remote fetcher");

        let state = AppState {
            render: Arc::new(RenderService::new(renderer)),
            workspaces: Arc::new(WorkspaceRoot::new(root.path()).expect("workspace root")),
            remote: Arc::new(remote),
        };

        Self {
            router: build_router(state, body_limit),
            root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    /// Names of entries left under the workspace root.
    pub fn leftovers(&self) -> Vec<String> {
        std::fs::read_dir(self.root.path())
            .expect("read workspace root")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).expect("utf-8 body")
}

/// Hand-assembled `multipart/form-data` payload.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                .as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .expect("request should build")
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}
