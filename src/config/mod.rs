//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, RemoteOverrides, RendererOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pressroom";
const ENV_PREFIX: &str = "PRESSROOM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 50 * 1024 * 1024;
const DEFAULT_RENDERER_COMMAND: &str = "weasyprint";
const DEFAULT_RENDERER_PYTHON: &str = "python3";
const DEFAULT_REMOTE_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_REMOTE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub workspace: WorkspaceSettings,
    pub uploads: UploadSettings,
    pub renderer: RendererSettings,
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_request_bytes: NonZeroU64,
}

impl UploadSettings {
    /// The request body limit as accepted by axum. Range-checked while loading.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_request_bytes.get()).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub command: String,
    pub args: Vec<String>,
    /// Run WeasyPrint through the fetch guard with `python` instead of invoking `command`.
    pub guarded: bool,
    pub python: String,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Hosts source documents may be fetched from. Empty allows any host.
    pub allowed_hosts: Vec<String>,
    pub max_document_bytes: u64,
    pub connect_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("remote.allowed_hosts")
            .with_list_parse_key("renderer.args")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    workspace: RawWorkspaceSettings,
    uploads: RawUploadSettings,
    renderer: RawRendererSettings,
    remote: RawRemoteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(root) = overrides.workspace_root.as_ref() {
            self.workspace.root = Some(root.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }

        self.apply_renderer_overrides(&overrides.renderer);
        self.apply_remote_overrides(&overrides.remote);
    }

    fn apply_renderer_overrides(&mut self, overrides: &RendererOverrides) {
        if let Some(command) = overrides.command.as_ref() {
            self.renderer.command = Some(command.clone());
        }
        if !overrides.args.is_empty() {
            self.renderer.args = Some(overrides.args.clone());
        }
        if let Some(guarded) = overrides.guarded {
            self.renderer.guarded = Some(guarded);
        }
        if let Some(python) = overrides.python.as_ref() {
            self.renderer.python = Some(python.clone());
        }
    }

    fn apply_remote_overrides(&mut self, overrides: &RemoteOverrides) {
        if !overrides.allowed_hosts.is_empty() {
            self.remote.allowed_hosts = Some(overrides.allowed_hosts.clone());
        }
        if let Some(limit) = overrides.max_document_bytes {
            self.remote.max_document_bytes = Some(limit);
        }
        if let Some(seconds) = overrides.connect_timeout_seconds {
            self.remote.connect_timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            workspace,
            uploads,
            renderer,
            remote,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            workspace: build_workspace_settings(workspace)?,
            uploads: build_upload_settings(uploads)?,
            renderer: build_renderer_settings(renderer)?,
            remote: build_remote_settings(remote)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.host", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_secs = non_zero_u32(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs.get().into()),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_workspace_settings(
    workspace: RawWorkspaceSettings,
) -> Result<WorkspaceSettings, LoadError> {
    let root = workspace.root.unwrap_or_else(std::env::temp_dir);
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "workspace.root",
            "path must not be empty",
        ));
    }
    Ok(WorkspaceSettings { root })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings { max_request_bytes })
}

fn build_renderer_settings(renderer: RawRendererSettings) -> Result<RendererSettings, LoadError> {
    let command = renderer
        .command
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_RENDERER_COMMAND.to_string());
    if command.is_empty() {
        return Err(LoadError::invalid(
            "renderer.command",
            "command must not be empty",
        ));
    }

    let python = renderer
        .python
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_RENDERER_PYTHON.to_string());
    if python.is_empty() {
        return Err(LoadError::invalid(
            "renderer.python",
            "interpreter must not be empty",
        ));
    }

    Ok(RendererSettings {
        command,
        args: renderer.args.unwrap_or_default(),
        guarded: renderer.guarded.unwrap_or(true),
        python,
    })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let allowed_hosts = remote
        .allowed_hosts
        .unwrap_or_default()
        .into_iter()
        .map(|host| host.trim().to_ascii_lowercase())
        .filter(|host| !host.is_empty())
        .collect();

    let max_document_bytes = NonZeroU64::new(
        remote
            .max_document_bytes
            .unwrap_or(DEFAULT_REMOTE_MAX_DOCUMENT_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("remote.max_document_bytes", "must be greater than zero"))?;

    let connect_timeout_secs = non_zero_u32(
        remote
            .connect_timeout_seconds
            .unwrap_or(DEFAULT_REMOTE_CONNECT_TIMEOUT_SECS),
        "remote.connect_timeout_seconds",
    )?;

    Ok(RemoteSettings {
        allowed_hosts,
        max_document_bytes: max_document_bytes.get(),
        connect_timeout: Duration::from_secs(connect_timeout_secs.get().into()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWorkspaceSettings {
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRendererSettings {
    command: Option<String>,
    args: Option<Vec<String>>,
    guarded: Option<bool>,
    python: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    allowed_hosts: Option<Vec<String>>,
    max_document_bytes: Option<u64>,
    connect_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
