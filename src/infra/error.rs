use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::config::LoadError;

/// Failures while bringing the service up.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("workspace root `{}` is unusable", root.display())]
    WorkspaceRoot {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error")]
    Configuration(#[from] LoadError),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
