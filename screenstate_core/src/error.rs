use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScreenError {
    /// Transient capture failure; the attempt is consumed and counted as no match.
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("device channel disconnected: {0}")]
    ChannelDisconnected(String),
    /// Diagnostic only; never ends a wait.
    #[error("classification degraded: {0}")]
    ClassificationDegraded(String),
    #[error("corrective action '{action}' failed: {reason}")]
    ActionDispatchFailed { action: String, reason: String },
    /// Recovered by falling back to the built-in signatures.
    #[error("signature store corrupt: {0}")]
    StoreCorrupt(String),
}

impl ScreenError {
    /// True for errors that end a wait immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScreenError::ChannelDisconnected(_) | ScreenError::ActionDispatchFailed { .. }
        )
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing device channel")]
    MissingDevice,
    #[error("missing target state")]
    MissingTarget,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("invalid signature '{state}': {reason}")]
    InvalidSignature { state: String, reason: String },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
