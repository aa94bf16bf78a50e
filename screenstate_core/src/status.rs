//! Outcome of a wait and the reasons a wait can end early.

use std::time::Duration;

use crate::error::ScreenError;
use crate::session::Session;

/// User-visible result of a wait: exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Target state observed.
    Success,
    /// Poll budget exhausted without observing the target.
    Timeout,
    /// Ended early; see [`FatalCause`].
    Fatal,
}

impl core::fmt::Display for Outcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Outcome::Success => "success",
            Outcome::Timeout => "timeout",
            Outcome::Fatal => "fatal",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FatalCause {
    /// `ChannelDisconnected` or `ActionDispatchFailed`.
    Error(ScreenError),
    /// Escalation found nothing to do. `observed: None` means no frame was
    /// ever classified; `Some("unknown")` means frames were unrecognized.
    NoCorrectiveAction { observed: Option<String> },
    Cancelled,
}

impl core::fmt::Display for FatalCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FatalCause::Error(e) => write!(f, "{e}"),
            FatalCause::NoCorrectiveAction { observed: None } => {
                f.write_str("no corrective action: nothing was observed")
            }
            FatalCause::NoCorrectiveAction {
                observed: Some(state),
            } => write!(f, "no corrective action for observed state '{state}'"),
            FatalCause::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Final report of one `wait_for_state` call.
#[derive(Debug, Clone)]
pub struct WaitReport {
    pub outcome: Outcome,
    /// Set iff `outcome == Outcome::Fatal`.
    pub cause: Option<FatalCause>,
    pub session: Session,
    pub elapsed: Duration,
}

impl WaitReport {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}
