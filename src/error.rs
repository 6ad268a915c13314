//! Error types for a sync run.
//!
//! Any error returned from `SyncJob::run` aborts the run. Errors raised while
//! copying a single file are logged by the transfer step and the run moves on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("remote API error: {0}")]
    Remote(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
