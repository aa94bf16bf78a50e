//! PNG <-> `Frame` helpers.

use std::path::Path;

use screenstate_traits::Frame;

use crate::error::{DeviceError, Result};

/// Decode PNG bytes (as produced by `screencap -p`) into an RGB frame.
pub fn decode_png(bytes: &[u8]) -> Result<Frame> {
    if bytes.is_empty() {
        return Err(DeviceError::Decode("empty image data".into()));
    }
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .map_err(|e| DeviceError::Decode(e.to_string()))?
        .to_rgb8();
    let (w, h) = img.dimensions();
    Frame::from_rgb(w, h, img.into_raw())
        .ok_or_else(|| DeviceError::Decode(format!("buffer does not match {w}x{h}")))
}

pub fn load_frame_png(path: &Path) -> Result<Frame> {
    let bytes = std::fs::read(path)?;
    decode_png(&bytes)
}

pub fn save_frame_png(frame: &Frame, path: &Path) -> Result<()> {
    let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.as_raw().to_vec())
        .ok_or_else(|| DeviceError::Decode("frame buffer does not match its size".into()))?;
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| DeviceError::Decode(e.to_string()))
}
