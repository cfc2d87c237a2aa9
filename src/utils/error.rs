use crate::stress::event::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to connect to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH handshake with {addr} failed: {source}")]
    HandshakeFailed {
        addr: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("Authentication failed for user {username}: {source}")]
    AuthenticationFailed {
        username: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("Upload of {local} to {remote} failed: {message}")]
    UploadFailed {
        local: String,
        remote: String,
        message: String,
    },

    #[error("Canceled")]
    Canceled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source path does not exist: {path}")]
    SourceNotFound { path: String },

    #[error("Thread pool is shut down")]
    PoolClosed,

    #[error("Thread join error")]
    ThreadJoinError,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    SshError(#[from] ssh2::Error),
}

impl TransferError {
    /// 任务级别的错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::ConnectionFailed { .. }
            | TransferError::HandshakeFailed { .. }
            | TransferError::AuthenticationFailed { .. } => ErrorKind::Connection,
            TransferError::UploadFailed { .. } | TransferError::IoError(_) => ErrorKind::Transfer,
            TransferError::Canceled => ErrorKind::Canceled,
            _ => ErrorKind::Unexpected,
        }
    }
}
