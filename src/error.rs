//! Error model used by the background controller.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControllerError>;

/// Represents failure modes of the controller: missing sync handlers, transient
/// storage faults, secret-store access problems, authorization probe parsing and
/// window-system errors. None of these are fatal to the process; each degrades a
/// single feature path.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no handler registered for channel '{0}'")]
    HandlerMissing(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("secret store error: {0}")]
    SecretStore(String),
    #[error("probe parse error: {0}")]
    ProbeParse(String),
    #[error("window error: {0}")]
    Window(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for ControllerError {
    /// Converts payload decode failures into storage errors.
    fn from(err: serde_json::Error) -> Self {
        ControllerError::Storage(err.to_string())
    }
}
