pub mod clock;
pub mod frame;

pub use clock::{Clock, MonotonicClock};
pub use frame::{Frame, Rect};

/// A single input or launch command sent to the controlled device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandSpec {
    Tap {
        x: u32,
        y: u32,
    },
    Swipe {
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration_ms: u32,
    },
    /// Android key code (e.g. 224 = KEYCODE_WAKEUP).
    KeyEvent(u32),
    /// Bring an installed package to the foreground.
    LaunchApp(String),
}

impl core::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandSpec::Tap { x, y } => write!(f, "tap({x},{y})"),
            CommandSpec::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => write!(f, "swipe({x1},{y1}->{x2},{y2},{duration_ms}ms)"),
            CommandSpec::KeyEvent(code) => write!(f, "keyevent({code})"),
            CommandSpec::LaunchApp(pkg) => write!(f, "launch({pkg})"),
        }
    }
}

/// Frame capture and command execution against the remote device.
///
/// Every call carries an explicit timeout; implementations must return an
/// error instead of blocking past it.
pub trait DeviceChannel {
    fn capture_frame(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>>;
    fn run_command(
        &mut self,
        cmd: &CommandSpec,
        timeout: std::time::Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<D: DeviceChannel + ?Sized> DeviceChannel for Box<D> {
    fn capture_frame(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        (**self).capture_frame(timeout)
    }
    fn run_command(
        &mut self,
        cmd: &CommandSpec,
        timeout: std::time::Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).run_command(cmd, timeout)
    }
}

/// Reads a loading percentage (0..=100) out of a screen zone.
pub trait PercentageReader {
    fn extract_percentage(&mut self, frame: &Frame, zone: Rect) -> Option<u8>;
}
