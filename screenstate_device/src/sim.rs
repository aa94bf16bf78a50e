//! Scripted `DeviceChannel` for tests and offline runs.
//!
//! Each capture consumes the next scripted step. Once the script is used up
//! the last delivered frame is repeated; a device that never delivered a
//! frame reports itself disconnected. Issued commands are recorded in a
//! shared log that stays readable after the device is moved into a waiter.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use screenstate_traits::{CommandSpec, DeviceChannel, Frame};

use crate::error::{DeviceError, Result};
use crate::png::load_frame_png;

#[derive(Debug, Clone)]
pub enum SimStep {
    Frame(Frame),
    /// Transient capture failure.
    CaptureError(String),
    Disconnect,
}

/// Shared view of what a [`SimulatedDevice`] did.
#[derive(Debug, Clone, Default)]
pub struct SimLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug, Default)]
struct LogInner {
    captures: usize,
    commands: Vec<CommandSpec>,
}

impl SimLog {
    pub fn captures(&self) -> usize {
        self.inner.lock().map(|l| l.captures).unwrap_or(0)
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.inner
            .lock()
            .map(|l| l.commands.clone())
            .unwrap_or_default()
    }

    fn record_capture(&self) {
        if let Ok(mut l) = self.inner.lock() {
            l.captures += 1;
        }
    }

    fn record_command(&self, cmd: &CommandSpec) {
        if let Ok(mut l) = self.inner.lock() {
            l.commands.push(cmd.clone());
        }
    }
}

#[derive(Debug, Default)]
pub struct SimulatedDevice {
    script: VecDeque<SimStep>,
    last_frame: Option<Frame>,
    command_error: Option<String>,
    /// Commands that still succeed before `command_error` applies.
    commands_ok: usize,
    log: SimLog,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        let mut dev = Self::new();
        for f in frames {
            dev.push(SimStep::Frame(f));
        }
        dev
    }

    /// Frames from every `*.png` in `dir`, in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect::<Vec<_>>();
        paths.sort();
        if paths.is_empty() {
            return Err(DeviceError::CommandFailed(format!(
                "no .png frames in {}",
                dir.display()
            )));
        }
        let mut dev = Self::new();
        for p in &paths {
            dev.push(SimStep::Frame(load_frame_png(p)?));
        }
        tracing::debug!(dir = %dir.display(), frames = paths.len(), "simulated frames loaded");
        Ok(dev)
    }

    pub fn push(&mut self, step: SimStep) -> &mut Self {
        self.script.push_back(step);
        self
    }

    pub fn then(mut self, step: SimStep) -> Self {
        self.script.push_back(step);
        self
    }

    /// Every subsequent `run_command` fails with `msg`.
    pub fn fail_commands(self, msg: impl Into<String>) -> Self {
        self.fail_commands_after(0, msg)
    }

    /// The next `ok` commands succeed; every one after that fails with `msg`.
    pub fn fail_commands_after(mut self, ok: usize, msg: impl Into<String>) -> Self {
        self.command_error = Some(msg.into());
        self.commands_ok = ok;
        self
    }

    pub fn log(&self) -> SimLog {
        self.log.clone()
    }
}

impl DeviceChannel for SimulatedDevice {
    fn capture_frame(
        &mut self,
        _timeout: Duration,
    ) -> std::result::Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        self.log.record_capture();
        match self.script.pop_front() {
            Some(SimStep::Frame(f)) => {
                self.last_frame = Some(f.clone());
                Ok(f)
            }
            Some(SimStep::CaptureError(msg)) => Err(Box::new(DeviceError::CommandFailed(msg))),
            Some(SimStep::Disconnect) => Err(Box::new(DeviceError::Disconnected(
                "simulated disconnect".into(),
            ))),
            None => match &self.last_frame {
                Some(f) => Ok(f.clone()),
                None => Err(Box::new(DeviceError::Disconnected(
                    "simulated script exhausted".into(),
                ))),
            },
        }
    }

    fn run_command(
        &mut self,
        cmd: &CommandSpec,
        _timeout: Duration,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.log.record_command(cmd);
        match &self.command_error {
            Some(_) if self.commands_ok > 0 => {
                self.commands_ok -= 1;
                Ok(())
            }
            Some(msg) => Err(Box::new(DeviceError::CommandFailed(msg.clone()))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_last_frame_after_script() {
        let a = Frame::solid(1, 1, [1, 1, 1]);
        let mut dev = SimulatedDevice::with_frames([a.clone()])
            .then(SimStep::CaptureError("blip".into()));
        let t = Duration::from_millis(1);
        assert_eq!(dev.capture_frame(t).unwrap(), a);
        assert!(dev.capture_frame(t).is_err());
        assert_eq!(dev.capture_frame(t).unwrap(), a);
        assert_eq!(dev.log().captures(), 3);
    }

    #[test]
    fn empty_script_reports_disconnect() {
        let mut dev = SimulatedDevice::new();
        let err = dev.capture_frame(Duration::from_millis(1)).unwrap_err();
        assert!(err.to_string().contains("disconnected"));
    }

    #[test]
    fn log_survives_move() {
        let dev = SimulatedDevice::new().fail_commands("nope");
        let log = dev.log();
        let mut boxed: Box<dyn DeviceChannel> = Box::new(dev);
        assert!(boxed
            .run_command(&CommandSpec::KeyEvent(3), Duration::from_millis(1))
            .is_err());
        assert_eq!(log.commands(), vec![CommandSpec::KeyEvent(3)]);
    }
}
