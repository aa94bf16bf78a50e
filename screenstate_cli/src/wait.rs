//! `classify` and `wait` commands: run the engine and report the result.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use screenstate_core::error::BuildError;
use screenstate_core::{ClassificationResult, FatalCause, Outcome, WaitCfg, WaitReport};
use serde_json::json;

use crate::cli::Cli;
use crate::device::{Loaded, build_waiter, open_device};

/// A wait that did not reach its target. Carried through `eyre` so the
/// error formatter can pick a stable exit code.
#[derive(Debug, thiserror::Error)]
pub enum WaitFailure {
    #[error("timed out waiting for '{target}' after {polls} polls")]
    Timeout { target: String, polls: u32 },
    #[error("wait for '{target}' stopped: {cause}")]
    Fatal { target: String, cause: FatalCause },
}

impl WaitFailure {
    fn from_report(report: &WaitReport) -> Option<Self> {
        let target = report.session.target.clone();
        match (report.outcome, &report.cause) {
            (Outcome::Success, _) => None,
            (Outcome::Timeout, _) => Some(WaitFailure::Timeout {
                target,
                polls: report.session.polls(),
            }),
            (Outcome::Fatal, cause) => Some(WaitFailure::Fatal {
                target,
                cause: cause.clone().unwrap_or(FatalCause::Cancelled),
            }),
        }
    }
}

pub fn classification_json(r: &ClassificationResult) -> serde_json::Value {
    let scores: Vec<_> = r
        .scores()
        .iter()
        .map(|s| {
            json!({
                "state": s.state,
                "matched": s.matched,
                "evaluated": s.evaluated,
                "skipped": s.skipped,
                "ratio": s.ratio,
                "min_ratio": s.min_ratio,
                "accepted": s.accepted(),
            })
        })
        .collect();
    json!({
        "state": r.label(),
        "unknown": r.is_unknown(),
        "confidence": r.confidence(),
        "scores": scores,
    })
}

pub fn run_classify(cli: &Cli, loaded: &Loaded, save_frame: Option<&Path>) -> eyre::Result<()> {
    let device = open_device(cli, &loaded.cfg)?;
    let mut waiter = build_waiter(loaded, device, WaitCfg::from(&loaded.cfg.wait), None)?;
    let (frame, result) = waiter
        .classify_once()
        .map_err(eyre::Report::new)
        .wrap_err("capture frame")?;

    if let Some(path) = save_frame {
        screenstate_device::png::save_frame_png(&frame, path)
            .wrap_err_with(|| format!("save frame to {}", path.display()))?;
        tracing::info!(path = %path.display(), "frame saved");
    }

    if cli.json {
        println!("{}", classification_json(&result));
    } else {
        println!("state: {} (confidence {:.2})", result.label(), result.confidence());
        for s in result.scores() {
            println!(
                "  {:<20} {}/{} matched, {} skipped, ratio {:.2} (needs {:.2})",
                s.state, s.matched, s.evaluated, s.skipped, s.ratio, s.min_ratio
            );
        }
    }
    Ok(())
}

pub fn report_json(report: &WaitReport) -> serde_json::Value {
    let s = &report.session;
    json!({
        "target": s.target,
        "outcome": report.outcome.to_string(),
        "cause": report.cause.as_ref().map(ToString::to_string),
        "pre_attempts": s.pre_attempts,
        "post_attempts": s.post_attempts,
        "dispatches": s.dispatches,
        "capture_errors": s.capture_errors,
        "last_seen": s.last_seen.as_ref().map(|o| o.label()),
        "confidence": s.last_seen.as_ref().map(|o| o.confidence),
        "progress": s.last_progress,
        "elapsed_ms": report.elapsed.as_millis() as u64,
    })
}

pub struct WaitArgs<'a> {
    pub target: &'a str,
    pub pre: Option<u32>,
    pub post: Option<u32>,
    pub interval_ms: Option<u64>,
}

pub fn run_wait(
    cli: &Cli,
    loaded: &Loaded,
    args: &WaitArgs<'_>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    if args.target.trim().is_empty() {
        return Err(eyre::Report::new(BuildError::MissingTarget));
    }
    let mut wait = WaitCfg::from(&loaded.cfg.wait);
    if let Some(n) = args.pre {
        wait.max_pre_attempts = n;
    }
    if let Some(n) = args.post {
        wait.max_post_attempts = n;
    }
    if let Some(ms) = args.interval_ms {
        wait.poll_interval = Duration::from_millis(ms);
    }

    let device = open_device(cli, &loaded.cfg)?;
    let mut waiter = build_waiter(loaded, device, wait, Some(shutdown))?;
    let report = waiter.wait_for_state(args.target);

    if cli.json {
        println!("{}", report_json(&report));
    } else {
        let s = &report.session;
        let last = s.last_seen.as_ref().map_or("nothing", |o| o.label());
        println!(
            "{}: {} after {} polls ({} pre, {} post), {} dispatch(es), last seen {} in {:.1}s",
            s.target,
            report.outcome,
            s.polls(),
            s.pre_attempts,
            s.post_attempts,
            s.dispatches,
            last,
            report.elapsed.as_secs_f32()
        );
        if let Some(p) = s.last_progress {
            println!("loading progress: {p}%");
        }
    }

    match WaitFailure::from_report(&report) {
        None => Ok(()),
        Some(f) => Err(eyre::Report::new(f)),
    }
}
