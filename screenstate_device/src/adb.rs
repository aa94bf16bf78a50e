//! `DeviceChannel` over the Android Debug Bridge command-line client.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use screenstate_traits::{CommandSpec, DeviceChannel, Frame};

use crate::error::{DeviceError, Result};
use crate::png::decode_png;
use crate::util::{CmdOutput, run_with_timeout};

/// stderr fragments adb prints when the target is gone.
const DISCONNECT_MARKERS: [&str; 5] = [
    "device not found",
    "device offline",
    "no devices",
    "device unauthorized",
    "closed",
];

#[derive(Debug, Clone)]
pub struct AdbDevice {
    adb: PathBuf,
    serial: Option<String>,
}

impl AdbDevice {
    pub fn new(adb: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            adb: adb.into(),
            serial,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.adb);
        if let Some(s) = &self.serial {
            cmd.arg("-s").arg(s);
        }
        cmd.args(args);
        cmd
    }

    fn run(&self, args: &[String], timeout: Duration) -> Result<CmdOutput> {
        tracing::trace!(args = ?args, "adb");
        let out = run_with_timeout(self.command(args), timeout)?;
        if out.status.success() {
            return Ok(out);
        }
        let msg = out.stderr_text();
        let lower = msg.to_lowercase();
        if DISCONNECT_MARKERS.iter().any(|m| lower.contains(m)) {
            Err(DeviceError::Disconnected(msg))
        } else {
            Err(DeviceError::CommandFailed(format!(
                "adb {} exited with {}: {}",
                args.join(" "),
                out.status,
                msg
            )))
        }
    }

    /// `adb get-state`; `"device"` when the target is usable.
    pub fn get_state(&self, timeout: Duration) -> Result<String> {
        let out = self.run(&["get-state".to_string()], timeout)?;
        Ok(out.stdout_text())
    }

    pub fn ensure_connected(&self, timeout: Duration) -> Result<()> {
        let state = self.get_state(timeout)?;
        if state == "device" {
            Ok(())
        } else {
            Err(DeviceError::Disconnected(format!("device state is '{state}'")))
        }
    }

    /// Screen resolution from `wm size`, preferring an override size.
    pub fn screen_size(&self, timeout: Duration) -> Result<(u32, u32)> {
        let out = self.run(&["shell".to_string(), "wm".to_string(), "size".to_string()], timeout)?;
        parse_wm_size(&out.stdout_text())
            .ok_or_else(|| DeviceError::CommandFailed(format!("unexpected `wm size` output: {}", out.stdout_text())))
    }
}

/// adb arguments (after `-s serial`) for one command.
pub fn command_args(cmd: &CommandSpec) -> Vec<String> {
    let mut args: Vec<String> = vec!["shell".into()];
    match cmd {
        CommandSpec::Tap { x, y } => {
            args.extend(["input".into(), "tap".into(), x.to_string(), y.to_string()]);
        }
        CommandSpec::Swipe {
            x1,
            y1,
            x2,
            y2,
            duration_ms,
        } => {
            args.extend([
                "input".into(),
                "swipe".into(),
                x1.to_string(),
                y1.to_string(),
                x2.to_string(),
                y2.to_string(),
                duration_ms.to_string(),
            ]);
        }
        CommandSpec::KeyEvent(code) => {
            args.extend(["input".into(), "keyevent".into(), code.to_string()]);
        }
        CommandSpec::LaunchApp(pkg) => {
            args.extend([
                "monkey".into(),
                "-p".into(),
                pkg.clone(),
                "-c".into(),
                "android.intent.category.LAUNCHER".into(),
                "1".into(),
            ]);
        }
    }
    args
}

pub fn parse_wm_size(text: &str) -> Option<(u32, u32)> {
    let pick = |prefix: &str| {
        text.lines()
            .find_map(|l| l.trim().strip_prefix(prefix))
            .and_then(|dims| {
                let (w, h) = dims.trim().split_once('x')?;
                Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?))
            })
    };
    pick("Override size:").or_else(|| pick("Physical size:"))
}

impl DeviceChannel for AdbDevice {
    fn capture_frame(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        let args = ["exec-out", "screencap", "-p"].map(String::from);
        let out = self.run(&args, timeout)?;
        Ok(decode_png(&out.stdout)?)
    }

    fn run_command(
        &mut self,
        cmd: &CommandSpec,
        timeout: Duration,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.run(&command_args(cmd), timeout)?;
        Ok(())
    }
}
