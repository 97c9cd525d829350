//! RPC status codes and error classification
//!
//! Every handler failure ends up as one of the bus status codes:
//! - OS failures are classified from their errno (access, argument, missing entity)
//! - Argument validation fails fast with `INVALID_ARGUMENT`
//! - Anything unrecognised is reported as `UNKNOWN_ERROR`

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Status codes understood by the bus front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcStatus {
    Ok,
    InvalidArgument,
    PermissionDenied,
    NotFound,
    UnknownError,
}

impl RpcStatus {
    /// Classify a failed system call by its errno
    pub fn from_errno(errno: Errno) -> Self {
        match errno {
            Errno::EACCES => RpcStatus::PermissionDenied,
            Errno::ENOTDIR | Errno::EINVAL => RpcStatus::InvalidArgument,
            Errno::ENOENT => RpcStatus::NotFound,
            _ => RpcStatus::UnknownError,
        }
    }

    /// Classify an I/O error, falling back to its kind when no OS code is attached
    pub fn from_io(err: &io::Error) -> Self {
        if let Some(code) = err.raw_os_error() {
            return Self::from_errno(Errno::from_i32(code));
        }

        match err.kind() {
            io::ErrorKind::PermissionDenied => RpcStatus::PermissionDenied,
            io::ErrorKind::NotFound => RpcStatus::NotFound,
            io::ErrorKind::InvalidInput => RpcStatus::InvalidArgument,
            _ => RpcStatus::UnknownError,
        }
    }

    /// Numeric code used on the wire (ubus numbering)
    pub fn code(self) -> u8 {
        match self {
            RpcStatus::Ok => 0,
            RpcStatus::InvalidArgument => 2,
            RpcStatus::NotFound => 4,
            RpcStatus::PermissionDenied => 6,
            RpcStatus::UnknownError => 9,
        }
    }
}

/// Handler failure carrying enough context for the reply and the log
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {errno}")]
    Os { context: String, errno: Errno },

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RpcError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RpcError::InvalidArgument(message.into())
    }

    pub fn status(&self) -> RpcStatus {
        match self {
            RpcError::InvalidArgument(_) => RpcStatus::InvalidArgument,
            RpcError::PermissionDenied(_) => RpcStatus::PermissionDenied,
            RpcError::MethodNotFound(_) | RpcError::NotFound(_) => RpcStatus::NotFound,
            RpcError::Io { source, .. } => RpcStatus::from_io(source),
            RpcError::Os { errno, .. } => RpcStatus::from_errno(*errno),
            RpcError::Encode(_) => RpcStatus::UnknownError,
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Attach a description of the failed source to low-level errors
pub trait SourceContext<T> {
    fn source_context(self, context: impl Into<String>) -> RpcResult<T>;
}

impl<T> SourceContext<T> for Result<T, io::Error> {
    fn source_context(self, context: impl Into<String>) -> RpcResult<T> {
        self.map_err(|source| RpcError::Io {
            context: context.into(),
            source,
        })
    }
}

impl<T> SourceContext<T> for Result<T, Errno> {
    fn source_context(self, context: impl Into<String>) -> RpcResult<T> {
        self.map_err(|errno| RpcError::Os {
            context: context.into(),
            errno,
        })
    }
}
