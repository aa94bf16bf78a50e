//! Corrective actions: an ordered `(trigger, action)` table, first match wins.

use std::time::Duration;

use screenstate_traits::{CommandSpec, DeviceChannel};

use crate::classifier::UNKNOWN;
use crate::error::ScreenError;

/// Trigger name matching every observation.
pub const ANY: &str = "any";

/// Names a signature cannot use, since triggers reserve them.
pub const RESERVED_STATES: [&str; 2] = [UNKNOWN, ANY];

/// What a rule reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A specific recognized state.
    State(String),
    /// The classifier returned unknown.
    Unknown,
    /// Any observation, recognized or not.
    AnyOther,
}

impl Trigger {
    /// `"unknown"` and `"any"` are reserved; anything else names a state.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            UNKNOWN => Trigger::Unknown,
            ANY => Trigger::AnyOther,
            other => Trigger::State(other.to_string()),
        }
    }

    /// `observed` is the classified state, `None` meaning unknown.
    pub fn matches(&self, observed: Option<&str>) -> bool {
        match (self, observed) {
            (Trigger::AnyOther, _) => true,
            (Trigger::Unknown, None) => true,
            (Trigger::State(s), Some(o)) => s == o,
            _ => false,
        }
    }
}

impl core::fmt::Display for Trigger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Trigger::State(s) => f.write_str(s),
            Trigger::Unknown => f.write_str(UNKNOWN),
            Trigger::AnyOther => f.write_str(ANY),
        }
    }
}

/// Named, ordered list of device commands. An empty list is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    commands: Vec<CommandSpec>,
}

impl Action {
    pub fn new(name: impl Into<String>, commands: Vec<CommandSpec>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn noop() -> Self {
        Self::new("no-op", Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Run every command in order; the first failure aborts the rest.
    pub fn dispatch<D: DeviceChannel + ?Sized>(
        &self,
        device: &mut D,
        timeout: Duration,
    ) -> Result<(), ScreenError> {
        tracing::info!(action = %self.name, commands = self.commands.len(), "dispatching corrective action");
        for cmd in &self.commands {
            tracing::debug!(action = %self.name, command = %cmd, "device command");
            if let Err(e) = device.run_command(cmd, timeout) {
                let err = ScreenError::ActionDispatchFailed {
                    action: self.name.clone(),
                    reason: format!("{cmd}: {e}"),
                };
                tracing::warn!(error = %err, "corrective action failed");
                return Err(err);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub trigger: Trigger,
    pub action: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTable {
    rules: Vec<Rule>,
}

impl ActionTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Append a rule; earlier rules keep precedence.
    pub fn with_rule(mut self, trigger: Trigger, action: Action) -> Self {
        self.rules.push(Rule { trigger, action });
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First action whose trigger matches `observed` (`None` = unknown).
    pub fn action_for(&self, observed: Option<&str>) -> Option<&Action> {
        self.rules
            .iter()
            .find(|r| r.trigger.matches(observed))
            .map(|r| &r.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use screenstate_traits::Frame;

    #[rstest]
    #[case("unknown", Trigger::Unknown)]
    #[case("any", Trigger::AnyOther)]
    #[case(" locked ", Trigger::State("locked".into()))]
    fn parses_triggers(#[case] s: &str, #[case] t: Trigger) {
        assert_eq!(Trigger::parse(s), t);
    }

    #[test]
    fn first_matching_rule_wins() {
        let table = ActionTable::default()
            .with_rule(Trigger::State("locked".into()), Action::new("unlock", vec![CommandSpec::KeyEvent(224)]))
            .with_rule(Trigger::AnyOther, Action::new("back", vec![CommandSpec::KeyEvent(4)]))
            .with_rule(Trigger::Unknown, Action::noop());
        assert_eq!(table.action_for(Some("locked")).map(Action::name), Some("unlock"));
        assert_eq!(table.action_for(Some("home")).map(Action::name), Some("back"));
        assert_eq!(table.action_for(None).map(Action::name), Some("back"));
        assert!(ActionTable::default().action_for(None).is_none());
    }

    struct FailSecond {
        seen: Vec<CommandSpec>,
    }

    impl DeviceChannel for FailSecond {
        fn capture_frame(
            &mut self,
            _timeout: Duration,
        ) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
            Ok(Frame::solid(1, 1, [0, 0, 0]))
        }
        fn run_command(
            &mut self,
            cmd: &CommandSpec,
            _timeout: Duration,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.seen.push(cmd.clone());
            if self.seen.len() == 2 {
                return Err("input service crashed".into());
            }
            Ok(())
        }
    }

    #[test]
    fn dispatch_stops_at_first_failure() {
        let action = Action::new(
            "unlock",
            vec![
                CommandSpec::KeyEvent(224),
                CommandSpec::Tap { x: 1, y: 2 },
                CommandSpec::KeyEvent(3),
            ],
        );
        let mut dev = FailSecond { seen: Vec::new() };
        let err = action.dispatch(&mut dev, Duration::from_millis(5)).unwrap_err();
        assert_eq!(dev.seen.len(), 2);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("tap(1,2): input service crashed"));
    }
}
