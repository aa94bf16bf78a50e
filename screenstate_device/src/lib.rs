//! Device channels and OCR for the screen-state engine.
//!
//! - `adb`: real devices through the `adb` client
//! - `sim`: scripted frames for tests and `--sim-frames`
//! - `tesseract`: loading-percentage OCR
pub mod adb;
pub mod error;
pub mod png;
pub mod sim;
pub mod tesseract;
pub mod util;

pub use adb::AdbDevice;
pub use error::DeviceError;
pub use sim::{SimLog, SimStep, SimulatedDevice};
pub use tesseract::TesseractReader;
