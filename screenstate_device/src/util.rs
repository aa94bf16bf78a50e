use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{DeviceError, Result};

/// Interval between `try_wait` checks on a running child.
const CHILD_POLL: Duration = Duration::from_millis(5);

/// Call `ready` until it yields a value or `timeout` expires.
/// Sleeps `poll_interval` between calls to avoid CPU spinning.
pub fn poll_until<T>(
    mut ready: impl FnMut() -> Result<Option<T>>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = ready()? {
            return Ok(v);
        }
        if Instant::now() >= deadline {
            return Err(DeviceError::Timeout);
        }
        thread::sleep(poll_interval);
    }
}

#[derive(Debug)]
pub struct CmdOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CmdOutput {
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// Run `cmd` to completion, killing it once `timeout` expires.
///
/// stdout and stderr are drained on helper threads so a chatty child cannot
/// block on a full pipe while we wait.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CmdOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn()?;

    let drain = |pipe: Option<Box<dyn Read + Send>>| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut p) = pipe {
                let _ = p.read_to_end(&mut buf);
            }
            buf
        })
    };
    let out_h = drain(child.stdout.take().map(|p| Box::new(p) as Box<dyn Read + Send>));
    let err_h = drain(child.stderr.take().map(|p| Box::new(p) as Box<dyn Read + Send>));

    let waited = poll_until(|| Ok(child.try_wait()?), timeout, CHILD_POLL);
    let status = match waited {
        Ok(s) => s,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(?timeout, "child process killed after timeout");
            return Err(e);
        }
    };

    Ok(CmdOutput {
        status,
        stdout: out_h.join().unwrap_or_default(),
        stderr: err_h.join().unwrap_or_default(),
    })
}
