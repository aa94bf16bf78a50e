//! tracing-subscriber setup: console layer plus an optional JSON file sink.

use std::path::Path;

use screenstate_config::Logging;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

/// Install the global subscriber.
///
/// Console output goes to stderr so stdout stays machine-readable. `RUST_LOG`
/// wins over `--log-level`; the file sink uses `logging.level` (default info).
pub fn init_logging(json: bool, console_level: &str, cfg: &Logging) {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level));

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = cfg.file.as_deref().map(|path| {
        let path = Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "screenstate.log".into(), |n| n.to_string_lossy().into_owned());
        let rotation = match cfg.rotation.as_deref() {
            Some("daily") => Rotation::DAILY,
            Some("hourly") => Rotation::HOURLY,
            _ => Rotation::NEVER,
        };
        let (writer, guard) = tracing_appender::non_blocking(RollingFileAppender::new(rotation, dir, name));
        let _ = FILE_GUARD.set(guard);
        let level = cfg.level.as_deref().unwrap_or("info");
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(EnvFilter::new(level))
            .boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
}
