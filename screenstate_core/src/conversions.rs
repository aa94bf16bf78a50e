//! `From` implementations bridging `screenstate_config` types and core types.

use std::time::Duration;

use screenstate_config::{ProbeToml, SignatureToml, StepToml};
use screenstate_traits::CommandSpec;

use crate::actions::{Action, ActionTable, Rule, Trigger};
use crate::config::{ClassifierCfg, Timeouts, WaitCfg};
use crate::probe::Probe;
use crate::signature::Signature;

// ── ClassifierCfg ────────────────────────────────────────────────────────────

impl From<&screenstate_config::ClassifierCfg> for ClassifierCfg {
    fn from(c: &screenstate_config::ClassifierCfg) -> Self {
        Self {
            min_ratio: c.min_ratio,
        }
    }
}

// ── WaitCfg ──────────────────────────────────────────────────────────────────

impl From<&screenstate_config::WaitCfg> for WaitCfg {
    fn from(c: &screenstate_config::WaitCfg) -> Self {
        Self {
            max_pre_attempts: c.max_pre_attempts,
            max_post_attempts: c.max_post_attempts,
            poll_interval: Duration::from_millis(c.poll_interval_ms),
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&screenstate_config::DeviceCfg> for Timeouts {
    fn from(c: &screenstate_config::DeviceCfg) -> Self {
        Self {
            capture: Duration::from_millis(c.capture_timeout_ms),
            command: Duration::from_millis(c.command_timeout_ms),
        }
    }
}

// ── Actions ──────────────────────────────────────────────────────────────────

/// Both sides live in foreign crates, so this is a function rather than `From`.
pub fn command_from_step(s: &StepToml) -> CommandSpec {
    match s {
        StepToml::Tap([x, y]) => CommandSpec::Tap { x: *x, y: *y },
        StepToml::Swipe([x1, y1, x2, y2, ms]) => CommandSpec::Swipe {
            x1: *x1,
            y1: *y1,
            x2: *x2,
            y2: *y2,
            duration_ms: *ms,
        },
        StepToml::Key(code) => CommandSpec::KeyEvent(*code),
        StepToml::Launch(pkg) => CommandSpec::LaunchApp(pkg.clone()),
    }
}

impl From<&screenstate_config::ActionRule> for Rule {
    fn from(r: &screenstate_config::ActionRule) -> Self {
        Rule {
            trigger: Trigger::parse(&r.when),
            action: Action::new(r.name.clone(), r.steps.iter().map(command_from_step).collect()),
        }
    }
}

impl From<&[screenstate_config::ActionRule]> for ActionTable {
    fn from(rules: &[screenstate_config::ActionRule]) -> Self {
        ActionTable::new(rules.iter().map(Rule::from).collect())
    }
}

// ── Signatures (core -> file) ────────────────────────────────────────────────

impl From<&Probe> for ProbeToml {
    fn from(p: &Probe) -> Self {
        match p {
            Probe::Point {
                id,
                x,
                y,
                color,
                tolerance,
            } => ProbeToml {
                id: id.clone(),
                x: Some(*x),
                y: Some(*y),
                color: Some(color.to_array()),
                tolerance: Some(*tolerance),
                ..ProbeToml::default()
            },
            Probe::AverageRegion {
                id,
                zone,
                color,
                tolerance,
            } => ProbeToml {
                id: id.clone(),
                zone: Some(zone.corners()),
                color: Some(color.to_array()),
                tolerance: Some(*tolerance),
                ..ProbeToml::default()
            },
            Probe::Template {
                id,
                zone,
                template,
                threshold,
            } => ProbeToml {
                id: id.clone(),
                zone: zone.map(|z| z.corners()),
                template: Some(template.source().to_string()),
                threshold: Some(*threshold),
                ..ProbeToml::default()
            },
        }
    }
}

impl From<&Signature> for SignatureToml {
    fn from(s: &Signature) -> Self {
        Self {
            state: s.state().to_string(),
            min_ratio: s.min_ratio(),
            probes: s.probes().iter().map(ProbeToml::from).collect(),
        }
    }
}
