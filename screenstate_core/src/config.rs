//! Runtime configuration for the classifier and the wait loop.
//!
//! These are separate from the TOML-deserialized config in `screenstate_config`;
//! see `conversions` for the bridge.

use std::time::Duration;

/// Classifier configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierCfg {
    /// Acceptance ratio for signatures without their own `min_ratio`. Range: (0.0, 1.0].
    pub min_ratio: f32,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self { min_ratio: 0.75 }
    }
}

/// Poll budget of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitCfg {
    /// Passive polls (phase A). At least one: escalation needs an observation.
    pub max_pre_attempts: u32,
    /// Polls after the corrective action (phase C).
    pub max_post_attempts: u32,
    /// Sleep between polls; also the settle delay after a dispatch.
    pub poll_interval: Duration,
}

impl Default for WaitCfg {
    fn default() -> Self {
        Self {
            max_pre_attempts: 5,
            max_post_attempts: 10,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Per-call device timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub capture: Duration,
    pub command: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            capture: Duration::from_secs(10),
            command: Duration::from_secs(10),
        }
    }
}
