//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use screenstate_traits::Rect;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "screenstate", version, about = "Screen-state detection and recovery for Android devices")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// ADB serial; overrides device.serial from the config
    #[arg(long, value_name = "SERIAL")]
    pub serial: Option<String>,

    /// Replay PNG frames from a directory instead of talking to a device
    #[arg(long, value_name = "DIR")]
    pub sim_frames: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture one frame and print its classification
    Classify {
        /// Also write the captured frame to this PNG file
        #[arg(long, value_name = "FILE")]
        save_frame: Option<PathBuf>,
    },
    /// Poll until the device shows TARGET, escalating with corrective actions
    Wait {
        /// State to wait for
        target: String,
        /// Override wait.max_pre_attempts
        #[arg(long, value_name = "N")]
        pre: Option<u32>,
        /// Override wait.max_post_attempts
        #[arg(long, value_name = "N")]
        post: Option<u32>,
        /// Override wait.poll_interval_ms
        #[arg(long = "interval-ms", value_name = "MS")]
        interval_ms: Option<u64>,
    },
    /// Record probes from the current screen into the signature store
    #[command(subcommand)]
    Calibrate(CalibrateCmd),
    /// Quick health check (config, store and device reachability)
    SelfCheck,
}

#[derive(Subcommand, Debug)]
pub enum CalibrateCmd {
    /// Sample one pixel as a point probe
    Point {
        #[arg(long)]
        state: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long, default_value_t = 10)]
        tolerance: u8,
    },
    /// Average a zone as a region probe
    Region {
        #[arg(long)]
        state: String,
        #[arg(long)]
        id: String,
        /// x1,y1,x2,y2 (half-open)
        #[arg(long, value_parser = parse_zone)]
        zone: Rect,
        #[arg(long, default_value_t = 10)]
        tolerance: u8,
    },
    /// Crop a zone into a template image and reference it from a template probe
    Template {
        #[arg(long)]
        state: String,
        #[arg(long)]
        id: String,
        /// x1,y1,x2,y2 (half-open)
        #[arg(long, value_parser = parse_zone)]
        zone: Rect,
        /// Minimum correlation score in [-1, 1]
        #[arg(long, default_value_t = 0.9)]
        threshold: f32,
        /// Area searched at classification time; defaults to the whole frame
        #[arg(long, value_parser = parse_zone)]
        search: Option<Rect>,
    },
    /// Bulk-import point probes from a CSV (state,id,x,y,r,g,b,tolerance)
    ImportCsv {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// `x1,y1,x2,y2` with `x1 < x2` and `y1 < y2`.
pub fn parse_zone(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("zone '{s}': {e}"))?;
    let [x1, y1, x2, y2] = parts[..] else {
        return Err(format!("zone '{s}': expected x1,y1,x2,y2"));
    };
    let r = Rect::new(x1, y1, x2, y2);
    if !r.is_well_formed() {
        return Err(format!("zone '{s}': needs x1 < x2 and y1 < y2"));
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn zones_parse_and_validate() {
        assert_eq!(parse_zone("1, 2,30,40"), Ok(Rect::new(1, 2, 30, 40)));
        assert!(parse_zone("1,2,3").is_err());
        assert!(parse_zone("5,5,5,9").is_err());
        assert!(parse_zone("a,b,c,d").is_err());
    }
}
