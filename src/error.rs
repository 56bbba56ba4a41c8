//! Service level error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;
use crate::rpc::RpcError;

/// Errors surfaced by the proxy to its callers and on the `error` event.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Upstream RPC failure (after failover, when several nodes exist).
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Fatal configuration problem; never retried.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Caller supplied bad arguments; rejected before any RPC call.
    #[error("{0}")]
    Validation(String),

    /// The operation raced a shutdown.
    #[error("{0}")]
    Stopping(String),

    /// Operation needs a fully synced daemon.
    #[error("Blockchain is not synced yet")]
    NotSynced,

    /// Spawning, signalling or waiting on the daemon process failed.
    #[error("Process error: {0}")]
    Process(String),

    /// The daemon exited with a non-zero status.
    #[error("alterdotd spawned process exited with status code: {0}")]
    ExitStatus(i32),

    /// A bounded wait ran out.
    #[error("{0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Upstream RPC code, when the error came from a daemon.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            ServiceError::Rpc(e) => e.code(),
            _ => None,
        }
    }

    /// Exit status for [`ServiceError::ExitStatus`].
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ServiceError::ExitStatus(code) => Some(*code),
            _ => None,
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
