use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid action: multiplier {0} is not one of 0.8, 0.9, 1.0, 1.1, 1.2")]
    InvalidAction(f64),
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Persistence failed: {0}")]
    Persist(#[from] PersistError),
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Why the policy table could not be read or written.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("model file {0} does not exist")]
    NotFound(PathBuf),
    #[error("permission denied for model file {0}")]
    PermissionDenied(PathBuf),
    #[error("model file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error on model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PersistError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => PersistError::NotFound(path),
            io::ErrorKind::PermissionDenied => PersistError::PermissionDenied(path),
            _ => PersistError::Io { path, source: err },
        }
    }
}
