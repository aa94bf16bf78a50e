mod calibrate;
mod cli;
mod device;
mod error_fmt;
mod logging;
mod wait;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use screenstate_core::SignatureStore;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::device::{Loaded, adb_device, load_config};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::wait::{WaitArgs, run_classify, run_wait};

fn main() -> ExitCode {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let result = load_config(cli.config.as_deref()).and_then(|loaded| {
        logging::init_logging(cli.json, &cli.log_level, &loaded.cfg.logging);
        run(&cli, &loaded)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            tracing::debug!(error = ?e, "command failed");
            ExitCode::from(u8::try_from(exit_code_for_error(&e)).unwrap_or(1))
        }
    }
}

fn run(cli: &Cli, loaded: &Loaded) -> eyre::Result<()> {
    match &cli.cmd {
        Commands::Classify { save_frame } => run_classify(cli, loaded, save_frame.as_deref()),
        Commands::Wait {
            target,
            pre,
            post,
            interval_ms,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                tracing::warn!(error = %e, "failed to install Ctrl-C handler");
            }
            let args = WaitArgs {
                target,
                pre: *pre,
                post: *post,
                interval_ms: *interval_ms,
            };
            run_wait(cli, loaded, &args, shutdown)
        }
        Commands::Calibrate(cmd) => calibrate::run_calibrate(cli, loaded, cmd),
        Commands::SelfCheck => self_check(cli, loaded),
    }
}

/// Config is already validated by `load_config`; check the store and the
/// device channel.
fn self_check(cli: &Cli, loaded: &Loaded) -> eyre::Result<()> {
    let path = loaded.store_path();
    match SignatureStore::try_load(&path)? {
        Some(store) if !store.is_empty() => {
            println!("store: {} signatures in {}", store.len(), path.display());
        }
        Some(_) => println!("store: {} has no usable signatures; built-ins apply", path.display()),
        None => println!("store: {} missing; built-ins apply", path.display()),
    }

    if let Some(dir) = &cli.sim_frames {
        screenstate_device::SimulatedDevice::from_dir(dir)
            .wrap_err_with(|| format!("load simulated frames from {}", dir.display()))?;
        println!("device: simulated frames in {}", dir.display());
    } else {
        let dev = adb_device(cli, &loaded.cfg);
        let timeout = Duration::from_millis(loaded.cfg.device.command_timeout_ms);
        dev.ensure_connected(timeout).wrap_err("connect to device")?;
        match dev.screen_size(timeout) {
            Ok((w, h)) => println!("device: connected, screen {w}x{h}"),
            Err(e) => {
                tracing::warn!(error = %e, "screen size unavailable");
                println!("device: connected");
            }
        }
    }
    println!("ok");
    Ok(())
}
