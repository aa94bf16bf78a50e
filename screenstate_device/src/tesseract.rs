//! Loading-percentage OCR through the `tesseract` command-line tool.

use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use image::{GrayImage, Luma};
use regex::Regex;
use screenstate_traits::{Frame, PercentageReader, Rect};
use tempfile::NamedTempFile;

use crate::error::{DeviceError, Result};
use crate::util::run_with_timeout;

/// "NN%" with optional whitespace before the sign.
const PERCENT_PATTERN: &str = r"(\d{1,3})\s*%";

fn percent_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PERCENT_PATTERN).ok()).as_ref()
}

/// First `NN%` in `text` with a value of at most 100.
pub fn percentage_from_text(text: &str) -> Option<u8> {
    percent_regex()?
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<u16>().ok())
        .find(|v| *v <= 100)
        .and_then(|v| u8::try_from(v).ok())
}

/// Keep pixels brighter than `threshold` on all channels as black text on
/// a white background.
pub fn threshold_bright_pixels(frame: &Frame, threshold: u8) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let bright = frame
            .pixel(x, y)
            .is_some_and(|[r, g, b]| r > threshold && g > threshold && b > threshold);
        Luma([if bright { 0 } else { 255 }])
    })
}

#[derive(Debug, Clone)]
pub struct TesseractReader {
    exe: String,
    text_threshold: u8,
    timeout: Duration,
}

impl TesseractReader {
    pub fn new(exe: impl Into<String>, text_threshold: u8, timeout: Duration) -> Self {
        Self {
            exe: exe.into(),
            text_threshold,
            timeout,
        }
    }

    fn recognize(&self, frame: &Frame, zone: Rect) -> Result<String> {
        let crop = frame.crop(&zone).ok_or_else(|| {
            DeviceError::CommandFailed(format!("zone {:?} outside frame", zone.corners()))
        })?;
        let img = threshold_bright_pixels(&crop, self.text_threshold);

        let input = NamedTempFile::with_suffix(".png")?;
        img.save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| DeviceError::CommandFailed(format!("write OCR input: {e}")))?;

        let mut cmd = Command::new(&self.exe);
        cmd.arg(input.path()).arg("stdout").arg("--psm").arg("7");
        let out = run_with_timeout(cmd, self.timeout)?;
        if !out.status.success() {
            return Err(DeviceError::CommandFailed(format!(
                "tesseract failed: {}",
                out.stderr_text()
            )));
        }
        Ok(out.stdout_text())
    }
}

impl PercentageReader for TesseractReader {
    fn extract_percentage(&mut self, frame: &Frame, zone: Rect) -> Option<u8> {
        match self.recognize(frame, zone) {
            Ok(text) => {
                let pct = percentage_from_text(&text);
                tracing::debug!(text = %text, progress = ?pct, "ocr");
                pct
            }
            Err(e) => {
                tracing::debug!(error = %e, "ocr unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Loading 42%", Some(42))]
    #[case("100 %", Some(100))]
    #[case("0%", Some(0))]
    #[case("250% 37%", Some(37))]
    #[case("no digits", None)]
    #[case("42", None)]
    fn parses_percentages(#[case] text: &str, #[case] expected: Option<u8>) {
        assert_eq!(percentage_from_text(text), expected);
    }

    #[test]
    fn threshold_keeps_only_bright_pixels() {
        let frame = Frame::from_fn(2, 1, |x, _| if x == 0 { [250, 250, 250] } else { [250, 100, 250] });
        let img = threshold_bright_pixels(&frame, 180);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [255]);
    }

    #[test]
    fn missing_binary_yields_none() {
        let mut r = TesseractReader::new("/nonexistent/tesseract", 180, Duration::from_millis(200));
        let frame = Frame::solid(10, 10, [255, 255, 255]);
        assert_eq!(r.extract_percentage(&frame, Rect::new(0, 0, 5, 5)), None);
    }
}
