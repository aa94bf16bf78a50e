//! Wait-for-state control loop.
//!
//! A wait runs in three phases against a fixed poll budget:
//!
//! - **pre**: up to `max_pre_attempts` passive polls.
//! - **escalation**: one corrective action chosen from the last observation.
//! - **post**: up to `max_post_attempts` polls; if the condition that
//!   triggered the action clears and then comes back, the same action is
//!   re-issued without leaving the phase.
//!
//! Polls are separated by `poll_interval` (no sleep after the last poll of a
//! phase) and one extra interval follows a successful dispatch. A failed
//! capture consumes its attempt; a disconnected channel ends the wait.

use std::sync::Arc;

use screenstate_traits::clock::{Clock, MonotonicClock};
use screenstate_traits::{DeviceChannel, Frame, PercentageReader, Rect};

use crate::actions::{Action, ActionTable};
use crate::classifier::{ClassificationResult, Classifier, UNKNOWN};
use crate::config::{ClassifierCfg, Timeouts, WaitCfg};
use crate::device_error::map_device_error;
use crate::error::{BuildError, Result, ScreenError};
use crate::session::{Observation, Session};
use crate::status::{FatalCause, Outcome, WaitReport};
use crate::store::{SignatureStore, StoreHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pre,
    Post,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

/// What one poll produced.
enum Poll {
    Seen(ClassificationResult),
    /// Capture failed transiently; attempt consumed.
    Missed,
    Fatal(ScreenError),
}

struct ProgressProbe {
    reader: Box<dyn PercentageReader>,
    zone: Rect,
}

/// Owns one device channel and drives waits against it.
pub struct StateWaiter<D: DeviceChannel> {
    device: D,
    store: StoreHandle,
    classifier: Classifier,
    actions: ActionTable,
    wait: WaitCfg,
    timeouts: Timeouts,
    clock: Arc<dyn Clock + Send + Sync>,
    cancel_check: Option<Box<dyn Fn() -> bool>>,
    progress: Option<ProgressProbe>,
}

impl<D: DeviceChannel> core::fmt::Debug for StateWaiter<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateWaiter")
            .field("signatures", &self.store.snapshot().len())
            .field("rules", &self.actions.rules().len())
            .field("wait", &self.wait)
            .field("timeouts", &self.timeouts)
            .field("progress", &self.progress.as_ref().map(|p| p.zone))
            .finish()
    }
}

impl<D: DeviceChannel> StateWaiter<D> {
    pub fn builder() -> StateWaiterBuilder<D> {
        StateWaiterBuilder::default()
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn wait_cfg(&self) -> &WaitCfg {
        &self.wait
    }

    /// Capture one frame and classify it, without any loop logic.
    pub fn classify_once(&mut self) -> std::result::Result<(Frame, ClassificationResult), ScreenError> {
        let frame = self
            .device
            .capture_frame(self.timeouts.capture)
            .map_err(|e| map_device_error(&*e))?;
        let store = self.store.snapshot();
        let result = self.classifier.classify(&frame, &store);
        Ok((frame, result))
    }

    /// Wait for `target` using the configured budget.
    pub fn wait_for_state(&mut self, target: &str) -> WaitReport {
        let cfg = self.wait;
        self.wait_for_state_with(target, cfg)
    }

    /// Wait for `target` with an explicit budget. A zero pre-action budget
    /// is raised to one poll.
    pub fn wait_for_state_with(&mut self, target: &str, mut cfg: WaitCfg) -> WaitReport {
        if cfg.max_pre_attempts == 0 {
            tracing::warn!(target_state = target, "max_pre_attempts is 0; polling once before escalation");
            cfg.max_pre_attempts = 1;
        }
        let mut session = Session::new(target, self.clock.now());
        if self.store.snapshot().get(target).is_none() {
            tracing::warn!(target_state = target, "target state has no signature; it can never be observed");
        }
        tracing::info!(
            target_state = target,
            max_pre = cfg.max_pre_attempts,
            max_post = cfg.max_post_attempts,
            poll_interval_ms = cfg.poll_interval.as_millis() as u64,
            "wait started"
        );

        // Phase A: passive detection.
        for attempt in 1..=cfg.max_pre_attempts {
            if self.cancelled() {
                return self.finish(session, Outcome::Fatal, Some(FatalCause::Cancelled));
            }
            session.pre_attempts = attempt;
            match self.poll(&mut session, Phase::Pre, attempt) {
                Poll::Seen(r) if r.is(target) => return self.finish(session, Outcome::Success, None),
                Poll::Seen(_) | Poll::Missed => {}
                Poll::Fatal(e) => return self.finish(session, Outcome::Fatal, Some(FatalCause::Error(e))),
            }
            if attempt < cfg.max_pre_attempts {
                self.clock.sleep(cfg.poll_interval);
            }
        }

        // Phase B: escalation.
        let Some(trigger) = session.last_seen.clone() else {
            tracing::warn!(target_state = target, "nothing observed before escalation");
            return self.finish(
                session,
                Outcome::Fatal,
                Some(FatalCause::NoCorrectiveAction { observed: None }),
            );
        };
        let Some(action) = self.actions.action_for(trigger.state.as_deref()).cloned() else {
            tracing::warn!(target_state = target, observed = trigger.label(), "no corrective action applies");
            let observed = Some(trigger.label().to_string());
            return self.finish(
                session,
                Outcome::Fatal,
                Some(FatalCause::NoCorrectiveAction { observed }),
            );
        };
        tracing::info!(target_state = target, observed = trigger.label(), action = action.name(), "escalating");
        if let Err(e) = self.dispatch(&mut session, &action) {
            return self.finish(session, Outcome::Fatal, Some(FatalCause::Error(e)));
        }
        self.clock.sleep(cfg.poll_interval);

        // Phase C: post-action detection with inline re-issue on recurrence.
        let mut cleared = false;
        for attempt in 1..=cfg.max_post_attempts {
            if self.cancelled() {
                return self.finish(session, Outcome::Fatal, Some(FatalCause::Cancelled));
            }
            session.post_attempts = attempt;
            match self.poll(&mut session, Phase::Post, attempt) {
                Poll::Seen(r) if r.is(target) => return self.finish(session, Outcome::Success, None),
                Poll::Seen(r) => {
                    let recurred = r.state() == trigger.state.as_deref();
                    if !recurred {
                        cleared = true;
                    } else if cleared {
                        tracing::info!(
                            target_state = target,
                            observed = trigger.label(),
                            action = action.name(),
                            attempt,
                            "condition recurred; re-issuing action"
                        );
                        if let Err(e) = self.dispatch(&mut session, &action) {
                            return self.finish(session, Outcome::Fatal, Some(FatalCause::Error(e)));
                        }
                        cleared = false;
                    }
                }
                Poll::Missed => {}
                Poll::Fatal(e) => return self.finish(session, Outcome::Fatal, Some(FatalCause::Error(e))),
            }
            if attempt < cfg.max_post_attempts {
                self.clock.sleep(cfg.poll_interval);
            }
        }

        self.finish(session, Outcome::Timeout, None)
    }

    fn cancelled(&self) -> bool {
        self.cancel_check.as_ref().is_some_and(|f| f())
    }

    fn dispatch(&mut self, session: &mut Session, action: &Action) -> std::result::Result<(), ScreenError> {
        session.dispatches += 1;
        action.dispatch(&mut self.device, self.timeouts.command)
    }

    fn poll(&mut self, session: &mut Session, phase: Phase, attempt: u32) -> Poll {
        let frame = match self.device.capture_frame(self.timeouts.capture) {
            Ok(f) => f,
            Err(e) => {
                let err = map_device_error(&*e);
                if err.is_fatal() {
                    tracing::error!(phase = phase.as_str(), attempt, error = %err, "device channel lost");
                    return Poll::Fatal(err);
                }
                session.capture_errors += 1;
                tracing::warn!(phase = phase.as_str(), attempt, error = %err, "capture failed; counting as no match");
                return Poll::Missed;
            }
        };

        let store = self.store.snapshot();
        let result = self.classifier.classify(&frame, &store);
        if let Some(d) = result.degraded() {
            tracing::debug!(phase = phase.as_str(), attempt, diagnostic = %d, "classification degraded");
        }

        if let Some(p) = self.progress.as_mut()
            && let Some(pct) = p.reader.extract_percentage(&frame, p.zone)
        {
            session.last_progress = Some(pct);
            tracing::info!(phase = phase.as_str(), attempt, progress = pct, "loading progress");
        }

        tracing::info!(
            phase = phase.as_str(),
            attempt,
            state = result.label(),
            confidence = result.confidence(),
            "poll"
        );
        session.last_seen = Some(Observation::from(&result));
        Poll::Seen(result)
    }

    fn finish(&self, session: Session, outcome: Outcome, cause: Option<FatalCause>) -> WaitReport {
        let elapsed = self.clock.elapsed_since(session.started_at);
        let last = session
            .last_seen
            .as_ref()
            .map_or(UNKNOWN, Observation::label)
            .to_string();
        match &cause {
            Some(c) => tracing::warn!(
                target_state = %session.target,
                outcome = %outcome,
                cause = %c,
                polls = session.polls(),
                dispatches = session.dispatches,
                "wait ended"
            ),
            None => tracing::info!(
                target_state = %session.target,
                outcome = %outcome,
                last_seen = %last,
                polls = session.polls(),
                dispatches = session.dispatches,
                elapsed_ms = elapsed.as_millis() as u64,
                "wait ended"
            ),
        }
        WaitReport {
            outcome,
            cause,
            session,
            elapsed,
        }
    }
}

/// Builder for [`StateWaiter`]. Only the device is required.
pub struct StateWaiterBuilder<D: DeviceChannel> {
    device: Option<D>,
    store: Option<StoreHandle>,
    classifier: Option<ClassifierCfg>,
    actions: Option<ActionTable>,
    wait: Option<WaitCfg>,
    timeouts: Option<Timeouts>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    cancel_check: Option<Box<dyn Fn() -> bool>>,
    progress: Option<ProgressProbe>,
}

impl<D: DeviceChannel> Default for StateWaiterBuilder<D> {
    fn default() -> Self {
        Self {
            device: None,
            store: None,
            classifier: None,
            actions: None,
            wait: None,
            timeouts: None,
            clock: None,
            cancel_check: None,
            progress: None,
        }
    }
}

impl<D: DeviceChannel> StateWaiterBuilder<D> {
    pub fn with_device(mut self, device: D) -> Self {
        self.device = Some(device);
        self
    }
    /// Defaults to [`SignatureStore::builtin`].
    pub fn with_store(mut self, store: SignatureStore) -> Self {
        self.store = Some(StoreHandle::new(store));
        self
    }
    /// Share a store with a calibration session; updates apply to the next poll.
    pub fn with_store_handle(mut self, handle: StoreHandle) -> Self {
        self.store = Some(handle);
        self
    }
    pub fn with_classifier(mut self, cfg: ClassifierCfg) -> Self {
        self.classifier = Some(cfg);
        self
    }
    pub fn with_actions(mut self, actions: ActionTable) -> Self {
        self.actions = Some(actions);
        self
    }
    pub fn with_wait(mut self, wait: WaitCfg) -> Self {
        self.wait = Some(wait);
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    pub fn with_cancel_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.cancel_check = Some(Box::new(f));
        self
    }
    /// Read a loading percentage from `zone` on every captured frame.
    pub fn with_progress(mut self, reader: impl PercentageReader + 'static, zone: Rect) -> Self {
        self.progress = Some(ProgressProbe {
            reader: Box::new(reader),
            zone,
        });
        self
    }

    pub fn build(self) -> Result<StateWaiter<D>> {
        let device = self
            .device
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDevice))?;

        let classifier = self.classifier.unwrap_or_default();
        if !(classifier.min_ratio > 0.0 && classifier.min_ratio <= 1.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "min_ratio must be in (0.0, 1.0]",
            )));
        }
        let wait = self.wait.unwrap_or_default();
        if wait.max_pre_attempts == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_pre_attempts must be >= 1",
            )));
        }
        let timeouts = self.timeouts.unwrap_or_default();
        if timeouts.capture.is_zero() || timeouts.command.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "device timeouts must be > 0",
            )));
        }
        if let Some(p) = &self.progress
            && !p.zone.is_well_formed()
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "progress zone must be non-empty",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        Ok(StateWaiter {
            device,
            store: self
                .store
                .unwrap_or_else(|| StoreHandle::new(SignatureStore::builtin())),
            classifier: Classifier::new(classifier),
            actions: self.actions.unwrap_or_default(),
            wait,
            timeouts,
            clock,
            cancel_check: self.cancel_check,
            progress: self.progress,
        })
    }
}
