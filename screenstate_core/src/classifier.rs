//! Frame classification against the signature store.
//!
//! For every signature, in registration order, each probe is evaluated and
//! the state's match ratio is `matched / evaluated` (skipped probes do not
//! count). States whose ratio reaches their acceptance ratio are candidates;
//! the highest ratio wins and exact ties go to the earlier registration.
//! Without a candidate the result is unknown, carrying the best ratio seen.

use screenstate_traits::Frame;

use crate::config::ClassifierCfg;
use crate::error::ScreenError;
use crate::probe::ProbeOutcome;
use crate::store::SignatureStore;

/// Label used for the unknown state in logs and action triggers.
pub const UNKNOWN: &str = "unknown";

/// Per-state diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct StateScore {
    pub state: String,
    pub matched: u32,
    pub evaluated: u32,
    pub skipped: u32,
    /// `matched / evaluated`, 0.0 when nothing was evaluated.
    pub ratio: f32,
    /// Acceptance ratio that applied to this state.
    pub min_ratio: f32,
}

impl StateScore {
    #[inline]
    pub fn accepted(&self) -> bool {
        self.evaluated > 0 && self.ratio >= self.min_ratio
    }
}

/// Outcome of classifying one frame. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    state: Option<String>,
    confidence: f32,
    scores: Vec<StateScore>,
}

impl ClassificationResult {
    /// The recognized state, or `None` for unknown.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// State name or [`UNKNOWN`].
    pub fn label(&self) -> &str {
        self.state.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.state.is_none()
    }

    pub fn is(&self, state: &str) -> bool {
        self.state.as_deref() == Some(state)
    }

    /// Match ratio of the winner, or the best ratio observed when unknown.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Full score table in registration order.
    pub fn scores(&self) -> &[StateScore] {
        &self.scores
    }

    /// Diagnostic error when any probe had to be skipped.
    pub fn degraded(&self) -> Option<ScreenError> {
        let skipped: Vec<String> = self
            .scores
            .iter()
            .filter(|s| s.skipped > 0)
            .map(|s| format!("{}: {} probe(s) out of bounds", s.state, s.skipped))
            .collect();
        if skipped.is_empty() {
            None
        } else {
            Some(ScreenError::ClassificationDegraded(skipped.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    cfg: ClassifierCfg,
}

impl Classifier {
    pub fn new(cfg: ClassifierCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &ClassifierCfg {
        &self.cfg
    }

    pub fn classify(&self, frame: &Frame, store: &SignatureStore) -> ClassificationResult {
        classify(frame, store, &self.cfg)
    }
}

/// Classify one frame. Pure: same inputs, same result.
pub fn classify(frame: &Frame, store: &SignatureStore, cfg: &ClassifierCfg) -> ClassificationResult {
    let mut scores = Vec::with_capacity(store.len());
    for sig in store.iter() {
        let mut matched = 0u32;
        let mut evaluated = 0u32;
        let mut skipped = 0u32;
        for probe in sig.probes() {
            match probe.evaluate(frame) {
                ProbeOutcome::Matched => {
                    matched += 1;
                    evaluated += 1;
                }
                ProbeOutcome::Missed => evaluated += 1,
                ProbeOutcome::Skipped => {
                    skipped += 1;
                    tracing::debug!(
                        state = sig.state(),
                        probe = probe.id(),
                        kind = probe.kind(),
                        frame_w = frame.width(),
                        frame_h = frame.height(),
                        "probe outside frame; skipped"
                    );
                }
            }
        }
        let ratio = if evaluated == 0 {
            0.0
        } else {
            matched as f32 / evaluated as f32
        };
        scores.push(StateScore {
            state: sig.state().to_string(),
            matched,
            evaluated,
            skipped,
            ratio,
            min_ratio: sig.min_ratio().unwrap_or(cfg.min_ratio),
        });
    }

    let mut winner: Option<&StateScore> = None;
    for s in scores.iter().filter(|s| s.accepted()) {
        if winner.is_none_or(|w| s.ratio > w.ratio) {
            winner = Some(s);
        }
    }

    let (state, confidence) = match winner {
        Some(w) => (Some(w.state.clone()), w.ratio),
        None => (
            None,
            scores.iter().map(|s| s.ratio).fold(0.0_f32, f32::max),
        ),
    };

    tracing::trace!(
        state = state.as_deref().unwrap_or(UNKNOWN),
        confidence,
        "frame classified"
    );

    ClassificationResult {
        state,
        confidence,
        scores,
    }
}
