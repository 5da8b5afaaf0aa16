use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pressroom binary.
#[derive(Debug, Parser)]
#[command(
    name = "pressroom",
    version,
    about = "HTML to PDF rendering service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "PRESSROOM_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the rendering HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RendererOverrides {
    /// Override the renderer executable.
    #[arg(long = "renderer-command", value_name = "PROGRAM")]
    pub command: Option<String>,

    /// Extra argument passed to the renderer before its inputs; repeatable.
    #[arg(
        long = "renderer-arg",
        value_name = "ARG",
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,

    /// Run WeasyPrint behind the fetch guard (true) or invoke the renderer command directly.
    #[arg(
        long = "renderer-guarded",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub guarded: Option<bool>,

    /// Python interpreter used for the guarded renderer.
    #[arg(long = "renderer-python", value_name = "PROGRAM")]
    pub python: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RemoteOverrides {
    /// Host allowed as a source for URL rendering; repeatable.
    #[arg(long = "remote-allowed-host", value_name = "HOST")]
    pub allowed_hosts: Vec<String>,

    /// Override the size limit for fetched source documents in bytes.
    #[arg(long = "remote-max-document-bytes", value_name = "BYTES")]
    pub max_document_bytes: Option<u64>,

    /// Override the connect timeout for fetching source documents.
    #[arg(long = "remote-connect-timeout-seconds", value_name = "SECONDS")]
    pub connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub renderer: RendererOverrides,

    #[command(flatten)]
    pub remote: RemoteOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the directory request workspaces are created in.
    #[arg(long = "workspace-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub workspace_root: Option<PathBuf>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,
}
