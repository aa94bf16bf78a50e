use std::time::Instant;

use crate::classifier::{ClassificationResult, UNKNOWN};

/// Last classification seen by a wait.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// `None` when the frame was unrecognized.
    pub state: Option<String>,
    pub confidence: f32,
}

impl Observation {
    pub fn label(&self) -> &str {
        self.state.as_deref().unwrap_or(UNKNOWN)
    }
}

impl From<&ClassificationResult> for Observation {
    fn from(r: &ClassificationResult) -> Self {
        Self {
            state: r.state().map(str::to_string),
            confidence: r.confidence(),
        }
    }
}

/// Running counters for one wait. Lives exactly as long as the wait.
#[derive(Debug, Clone)]
pub struct Session {
    pub target: String,
    /// Polls used before escalation.
    pub pre_attempts: u32,
    /// Polls used after the corrective action.
    pub post_attempts: u32,
    /// Corrective actions dispatched, re-issues included.
    pub dispatches: u32,
    /// Polls whose capture failed.
    pub capture_errors: u32,
    pub started_at: Instant,
    pub last_seen: Option<Observation>,
    /// Last loading percentage read by OCR.
    pub last_progress: Option<u8>,
}

impl Session {
    pub fn new(target: impl Into<String>, started_at: Instant) -> Self {
        Self {
            target: target.into(),
            pre_attempts: 0,
            post_attempts: 0,
            dispatches: 0,
            capture_errors: 0,
            started_at,
            last_seen: None,
            last_progress: None,
        }
    }

    #[inline]
    pub fn polls(&self) -> u32 {
        self.pre_attempts + self.post_attempts
    }
}
