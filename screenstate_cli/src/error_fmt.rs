//! Human-readable error descriptions, exit codes and structured JSON errors.

use screenstate_core::FatalCause;
use screenstate_core::error::{BuildError, ScreenError};
use screenstate_device::DeviceError;

use crate::wait::WaitFailure;

/// Exit code for a wait that ran out of polls.
pub const EXIT_TIMEOUT: i32 = 3;
/// Exit code for a wait that stopped early.
pub const EXIT_FATAL: i32 = 4;

fn screen_error_text(e: &ScreenError) -> String {
    match e {
        ScreenError::ChannelDisconnected(msg) => format!(
            "What happened: The device channel was lost ({msg}).\nLikely causes: USB cable unplugged, adb server restarted, or the device went offline.\nHow to fix: Check `adb devices`, reconnect the device, then rerun."
        ),
        ScreenError::ActionDispatchFailed { action, reason } => format!(
            "What happened: Corrective action '{action}' could not be sent ({reason}).\nLikely causes: The input service rejected the command or the package id is wrong.\nHow to fix: Check the [[action]] steps in the config and try the command by hand with `adb shell`."
        ),
        ScreenError::Capture(msg) => format!(
            "What happened: Screen capture failed ({msg}).\nLikely causes: The screen is off, capture is blocked by a secure window, or the timeout is too low.\nHow to fix: Wake the device and consider raising device.capture_timeout_ms."
        ),
        other => format!(
            "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        ),
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(wf) = err.downcast_ref::<WaitFailure>() {
        return match wf {
            WaitFailure::Timeout { target, polls } => format!(
                "What happened: '{target}' was not observed within {polls} polls.\nLikely causes: The device is still loading, or the signature for '{target}' no longer matches the screen.\nHow to fix: Raise --post/--pre, or re-run `screenstate classify` and recalibrate the signature."
            ),
            WaitFailure::Fatal {
                target,
                cause: FatalCause::NoCorrectiveAction { observed },
            } => match observed {
                None => format!(
                    "What happened: No frame could be classified while waiting for '{target}', so no corrective action was chosen.\nLikely causes: Every screen capture failed.\nHow to fix: Run `screenstate self-check` and `screenstate classify` to check the device channel."
                ),
                Some(state) => format!(
                    "What happened: The device showed '{state}' instead of '{target}' and no corrective action applies to '{state}'.\nLikely causes: The [[action]] table has no rule for this state.\nHow to fix: Add an [[action]] with when = \"{state}\" (or \"any\") to the config."
                ),
            },
            WaitFailure::Fatal {
                cause: FatalCause::Cancelled,
                ..
            } => "What happened: The wait was cancelled.\nLikely causes: Ctrl-C or a shutdown signal.\nHow to fix: Rerun the command when ready.".to_string(),
            WaitFailure::Fatal {
                cause: FatalCause::Error(e),
                ..
            } => screen_error_text(e),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDevice => {
                "What happened: No device channel was provided to the waiter.\nLikely causes: The device failed to open or was not wired into the builder.\nHow to fix: Ensure the device is created successfully and passed via with_device(...).".to_string()
            }
            BuildError::MissingTarget => {
                "What happened: No target state was given.\nLikely causes: The command was run without a TARGET.\nHow to fix: Provide the state to wait for (e.g., `screenstate wait loaded`).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or on the command line.\nHow to fix: Edit the config file or flags, then rerun."
            ),
            BuildError::InvalidSignature { state, reason } => format!(
                "What happened: The signature for '{state}' is invalid ({reason}).\nLikely causes: A duplicate probe id or an empty zone.\nHow to fix: Fix the probe arguments and calibrate again."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScreenError>() {
        return screen_error_text(se);
    }

    if let Some(de) = err.downcast_ref::<DeviceError>() {
        return match de {
            DeviceError::Timeout => "What happened: An adb command timed out.\nLikely causes: The device is busy or unresponsive, or the timeout is too low.\nHow to fix: Check the device and consider raising device.command_timeout_ms.".to_string(),
            DeviceError::Disconnected(msg) => format!(
                "What happened: No usable device ({msg}).\nLikely causes: No device attached, USB debugging not authorized, or a wrong --serial.\nHow to fix: Check `adb devices` and pass the right serial."
            ),
            DeviceError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                "What happened: The adb executable was not found.\nLikely causes: Android platform-tools are not installed or not on PATH.\nHow to fix: Install platform-tools or set device.adb_path in the config.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug for details. Original: {err:#}"
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Out-of-range or malformed values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    // Probe CSV header special-case
    if lower.contains("probe csv must have headers") {
        return "Invalid headers in probe CSV. Expected 'state,id,x,y,r,g,b,tolerance'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 timeout, 4 fatal wait, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<WaitFailure>() {
        Some(WaitFailure::Timeout { .. }) => EXIT_TIMEOUT,
        Some(WaitFailure::Fatal { .. }) => EXIT_FATAL,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<WaitFailure>() {
        Some(WaitFailure::Timeout { .. }) => "Timeout",
        Some(WaitFailure::Fatal { cause, .. }) => match cause {
            FatalCause::NoCorrectiveAction { .. } => "NoCorrectiveAction",
            FatalCause::Cancelled => "Cancelled",
            FatalCause::Error(ScreenError::ChannelDisconnected(_)) => "ChannelDisconnected",
            FatalCause::Error(ScreenError::ActionDispatchFailed { .. }) => "ActionDispatchFailed",
            FatalCause::Error(_) => "Fatal",
        },
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(WaitFailure::Fatal {
        cause: FatalCause::NoCorrectiveAction {
            observed: Some(state),
        },
        ..
    }) = err.downcast_ref::<WaitFailure>()
    {
        obj["details"] = json!({ "observed": state });
    }
    obj.to_string()
}
