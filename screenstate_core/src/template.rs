//! Grayscale templates and zero-mean normalized cross-correlation.
//!
//! Scores follow `TM_CCOEFF_NORMED`: 1.0 is a perfect match, 0.0 no
//! correlation, -1.0 an inverted match. Window sums come from integral
//! images so each candidate position costs one pass over the template.

use std::path::Path;

use eyre::WrapErr;
use screenstate_traits::frame::luma_of;
use screenstate_traits::{Frame, Rect};

use crate::error::Result;

/// Variance below this is treated as a flat patch.
const FLAT_EPS: f64 = 1e-6;
/// Flat patches match when their mean intensities are this close.
const FLAT_MEAN_TOLERANCE: f64 = 1.0;

#[derive(Clone)]
pub struct Template {
    /// Path as referenced from the store file.
    source: String,
    width: u32,
    height: u32,
    luma: Vec<u8>,
    mean: f64,
    /// sqrt(sum((t - mean)^2))
    norm: f64,
}

impl core::fmt::Debug for Template {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.width == other.width
            && self.height == other.height
            && self.luma == other.luma
    }
}

impl Template {
    /// Wrap an 8-bit grayscale buffer. `None` for empty or mis-sized input.
    pub fn from_luma(source: impl Into<String>, width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || luma.len() != width as usize * height as usize {
            return None;
        }
        let n = luma.len() as f64;
        let mean = luma.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let norm = luma
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            .sqrt();
        Some(Self {
            source: source.into(),
            width,
            height,
            luma,
            mean,
            norm,
        })
    }

    /// Grayscale copy of a frame (BT.601 luma, rounded).
    pub fn from_frame(source: impl Into<String>, frame: &Frame) -> Option<Self> {
        let luma = frame
            .as_raw()
            .chunks_exact(3)
            .map(|px| to_u8(luma_of([px[0], px[1], px[2]])))
            .collect();
        Self::from_luma(source, frame.width(), frame.height(), luma)
    }

    /// Load `base_dir/source` from disk. Color images are reduced with the
    /// same luma weights the matcher applies to frames.
    pub fn load(base_dir: &Path, source: &str) -> Result<Self> {
        let path = base_dir.join(source);
        let img = image::open(&path)
            .wrap_err_with(|| format!("open template {}", path.display()))?
            .to_rgb8();
        let (w, h) = img.dimensions();
        let luma = img
            .pixels()
            .map(|p| to_u8(luma_of(p.0)))
            .collect::<Vec<u8>>();
        Self::from_luma(source, w, h, luma)
            .ok_or_else(|| eyre::eyre!("template {} is empty", path.display()))
    }

    /// Grayscale pixels encoded as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let img = image::GrayImage::from_raw(self.width, self.height, self.luma.clone())
            .ok_or_else(|| eyre::eyre!("template buffer does not match its size"))?;
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .wrap_err_with(|| format!("encode template {}", self.source))?;
        Ok(out.into_inner())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Best correlation score of the template inside `area`.
    ///
    /// Stops scanning as soon as a position scores `>= stop_at`. Returns
    /// `None` when `area` is not inside the frame or is smaller than the
    /// template.
    pub fn best_score(&self, frame: &Frame, area: &Rect, stop_at: f32) -> Option<f32> {
        if !frame.contains_rect(area) || self.width > area.width() || self.height > area.height() {
            return None;
        }
        let aw = area.width() as usize;
        let ah = area.height() as usize;
        let tw = self.width as usize;
        let th = self.height as usize;
        let n = (tw * th) as f64;

        let mut gray = Vec::with_capacity(aw * ah);
        for y in area.y1..area.y2 {
            for x in area.x1..area.x2 {
                gray.push(f64::from(frame.luma(x, y)?));
            }
        }
        let integral = Integral::new(&gray, aw, ah);

        let stop_at = f64::from(stop_at);
        let mut best = f64::NEG_INFINITY;
        for oy in 0..=(ah - th) {
            for ox in 0..=(aw - tw) {
                let (sum, sum_sq) = integral.window(ox, oy, tw, th);
                let var = (sum_sq - sum * sum / n).max(0.0);
                let score = if var < FLAT_EPS || self.norm * self.norm < FLAT_EPS {
                    let window_mean = sum / n;
                    let both_flat = var < FLAT_EPS && self.norm * self.norm < FLAT_EPS;
                    if both_flat && (window_mean - self.mean).abs() <= FLAT_MEAN_TOLERANCE {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    let mut cross = 0.0;
                    for ty in 0..th {
                        let row = (oy + ty) * aw + ox;
                        let trow = ty * tw;
                        for tx in 0..tw {
                            cross += gray[row + tx] * (f64::from(self.luma[trow + tx]) - self.mean);
                        }
                    }
                    (cross / (var.sqrt() * self.norm)).clamp(-1.0, 1.0)
                };
                if score > best {
                    best = score;
                    if best >= stop_at {
                        return Some(best as f32);
                    }
                }
            }
        }
        Some(best as f32)
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Summed-area tables for values and squared values.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Integral {
    fn new(values: &[f64], w: usize, h: usize) -> Self {
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sum_sq = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = values[y * w + x];
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sum_sq[i] = sum_sq[i - stride] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let a = y * s + x;
        let b = y * s + x + w;
        let c = (y + h) * s + x;
        let d = (y + h) * s + x + w;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
        )
    }
}
