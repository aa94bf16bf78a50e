use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device call timed out")]
    Timeout,
    #[error("device disconnected: {0}")]
    Disconnected(String),
    #[error("device command failed: {0}")]
    CommandFailed(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
