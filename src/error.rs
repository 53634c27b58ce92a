//! Error types for netplanctl

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetplanError {
    /// The current document could not be parsed
    #[error("Malformed document {path}: {reason}")]
    MalformedDocument { path: PathBuf, reason: String },
    /// The document exists but could not be read
    #[error("Read failed for {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },
    /// Document absent (recoverable through bootstrap)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Request fails a structural precondition
    #[error("Invalid change: {0}")]
    InvalidChange(String),
    /// Storage rejected the write
    #[error("Write failed for {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
    /// Background activation failed (logged only)
    #[error("Activation failed: {0}")]
    ActivationFailed(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Command execution failed
    #[error("Command '{cmd}' failed{}: {stderr}", exit_suffix(.code))]
    CommandFailed { cmd: String, code: Option<i32>, stderr: String },
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Interface not found
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with code {}", code),
        None => String::new(),
    }
}

impl NetplanError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        NetplanError::MalformedDocument {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn read_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        NetplanError::ReadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        NetplanError::WriteFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type NetplanResult<T> = Result<T, NetplanError>;
