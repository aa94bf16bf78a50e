use std::process::Command;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use screenstate_device::error::DeviceError;
use screenstate_device::util::{poll_until, run_with_timeout};

#[test]
fn poll_until_success_path() {
    let ready = Arc::new(AtomicBool::new(false));
    let ready_bg = ready.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        ready_bg.store(true, Ordering::Relaxed);
    });

    let res = poll_until(
        || Ok(ready.load(Ordering::Relaxed).then_some(7)),
        Duration::from_millis(500),
        Duration::from_micros(200),
    );
    assert_eq!(res.ok(), Some(7));
}

#[test]
fn poll_until_timeout_path() {
    let err = poll_until(
        || Ok(None::<()>),
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        DeviceError::Timeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn run_with_timeout_captures_stdout() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("printf hello; printf oops >&2");
    let out = run_with_timeout(cmd, Duration::from_secs(5)).expect("sh runs");
    assert!(out.status.success());
    assert_eq!(out.stdout_text(), "hello");
    assert_eq!(out.stderr_text(), "oops");
}

#[cfg(unix)]
#[test]
fn run_with_timeout_kills_slow_child() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let started = std::time::Instant::now();
    let err = run_with_timeout(cmd, Duration::from_millis(50)).expect_err("should time out");
    assert!(matches!(err, DeviceError::Timeout));
    assert!(started.elapsed() < Duration::from_secs(4));
}
