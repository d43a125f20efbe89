use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Media load failed: {0}")]
    LoadFailed(String),

    #[error("Unknown media handle: {0}")]
    InvalidHandle(u64),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
