//! Device channel and waiter assembly from config and CLI flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use screenstate_config::Config;
use screenstate_core::{ActionTable, ClassifierCfg, SignatureStore, StateWaiter, Timeouts, WaitCfg};
use screenstate_device::{AdbDevice, SimulatedDevice, TesseractReader};
use screenstate_traits::{DeviceChannel, Rect};

use crate::cli::Cli;

pub type AnyDevice = Box<dyn DeviceChannel>;

/// Loaded config plus the directory relative paths in it resolve against.
pub struct Loaded {
    pub cfg: Config,
    pub base: PathBuf,
}

impl Loaded {
    pub fn store_path(&self) -> PathBuf {
        self.base.join(&self.cfg.store.path)
    }
}

pub fn load_config(path: Option<&Path>) -> eyre::Result<Loaded> {
    let Some(path) = path else {
        return Ok(Loaded {
            cfg: Config::default(),
            base: PathBuf::from("."),
        });
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = screenstate_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok(Loaded { cfg, base })
}

pub fn adb_device(cli: &Cli, cfg: &Config) -> AdbDevice {
    let serial = cli.serial.clone().or_else(|| cfg.device.serial.clone());
    AdbDevice::new(&cfg.device.adb_path, serial)
}

pub fn open_device(cli: &Cli, cfg: &Config) -> eyre::Result<AnyDevice> {
    if let Some(dir) = &cli.sim_frames {
        let dev = SimulatedDevice::from_dir(dir)
            .wrap_err_with(|| format!("load simulated frames from {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "using simulated device");
        return Ok(Box::new(dev));
    }
    let dev = adb_device(cli, cfg);
    dev.ensure_connected(Duration::from_millis(cfg.device.command_timeout_ms))
        .wrap_err("connect to device")?;
    tracing::info!(serial = dev.serial().unwrap_or("default"), "using adb device");
    Ok(Box::new(dev))
}

/// Build a waiter over `device` with everything the config describes.
pub fn build_waiter(
    loaded: &Loaded,
    device: AnyDevice,
    wait: WaitCfg,
    shutdown: Option<Arc<AtomicBool>>,
) -> eyre::Result<StateWaiter<AnyDevice>> {
    let cfg = &loaded.cfg;
    let store = SignatureStore::load(&loaded.store_path());
    let mut builder = StateWaiter::builder()
        .with_device(device)
        .with_store(store)
        .with_classifier(ClassifierCfg::from(&cfg.classifier))
        .with_actions(ActionTable::from(cfg.actions.as_slice()))
        .with_wait(wait)
        .with_timeouts(Timeouts::from(&cfg.device));
    if let Some(flag) = shutdown {
        builder = builder.with_cancel_check(move || flag.load(Ordering::Relaxed));
    }
    if let Some(p) = &cfg.progress {
        let reader = TesseractReader::new(
            &p.tesseract_path,
            p.text_threshold,
            Duration::from_millis(cfg.device.command_timeout_ms),
        );
        builder = builder.with_progress(reader, Rect::from_corners(p.zone));
    }
    builder.build()
}
