//! Probes: the individual checks a signature is made of.

use screenstate_traits::{Frame, Rect};

use crate::template::Template;

/// Expected RGB color of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub const fn from_array(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Per-channel comparison: every channel within `tolerance`.
    #[inline]
    pub fn matches(self, actual: [u8; 3], tolerance: u8) -> bool {
        self.r.abs_diff(actual[0]) <= tolerance
            && self.g.abs_diff(actual[1]) <= tolerance
            && self.b.abs_diff(actual[2]) <= tolerance
    }

    /// Same as [`Color::matches`] against a fractional mean color.
    #[inline]
    pub fn matches_mean(self, mean: [f64; 3], tolerance: u8) -> bool {
        let tol = f64::from(tolerance);
        self.to_array()
            .iter()
            .zip(mean.iter())
            .all(|(&e, &m)| (m - f64::from(e)).abs() <= tol)
    }
}

impl core::fmt::Display for Color {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Result of evaluating one probe against one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Matched,
    Missed,
    /// Probe geometry falls outside the frame; excluded from the match ratio.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Point {
        id: String,
        x: u32,
        y: u32,
        color: Color,
        tolerance: u8,
    },
    AverageRegion {
        id: String,
        zone: Rect,
        color: Color,
        tolerance: u8,
    },
    /// Normalized cross-correlation search; `zone: None` searches the full frame.
    Template {
        id: String,
        zone: Option<Rect>,
        template: Template,
        threshold: f32,
    },
}

impl Probe {
    pub fn id(&self) -> &str {
        match self {
            Probe::Point { id, .. } | Probe::AverageRegion { id, .. } | Probe::Template { id, .. } => {
                id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Probe::Point { .. } => "point",
            Probe::AverageRegion { .. } => "region",
            Probe::Template { .. } => "template",
        }
    }

    /// Structural check independent of any frame.
    pub fn check(&self) -> Result<(), String> {
        if self.id().trim().is_empty() {
            return Err("probe id must not be empty".into());
        }
        match self {
            Probe::Point { .. } => Ok(()),
            Probe::AverageRegion { zone, .. } => {
                if zone.is_well_formed() {
                    Ok(())
                } else {
                    Err(format!("probe '{}': zone {:?} is empty or inverted", self.id(), zone.corners()))
                }
            }
            Probe::Template {
                zone,
                template,
                threshold,
                ..
            } => {
                if let Some(z) = zone
                    && !z.is_well_formed()
                {
                    return Err(format!(
                        "probe '{}': zone {:?} is empty or inverted",
                        self.id(),
                        z.corners()
                    ));
                }
                if !threshold.is_finite() || !(-1.0..=1.0).contains(threshold) {
                    return Err(format!(
                        "probe '{}': threshold must be within [-1, 1]",
                        self.id()
                    ));
                }
                if let Some(z) = zone
                    && (template.width() > z.width() || template.height() > z.height())
                {
                    return Err(format!(
                        "probe '{}': template {}x{} does not fit its zone",
                        self.id(),
                        template.width(),
                        template.height()
                    ));
                }
                Ok(())
            }
        }
    }

    /// Evaluate against one frame. Never panics on geometry outside the frame.
    pub fn evaluate(&self, frame: &Frame) -> ProbeOutcome {
        match self {
            Probe::Point {
                x,
                y,
                color,
                tolerance,
                ..
            } => match frame.pixel(*x, *y) {
                Some(px) if color.matches(px, *tolerance) => ProbeOutcome::Matched,
                Some(_) => ProbeOutcome::Missed,
                None => ProbeOutcome::Skipped,
            },
            Probe::AverageRegion {
                zone,
                color,
                tolerance,
                ..
            } => match mean_color(frame, zone) {
                Some(mean) if color.matches_mean(mean, *tolerance) => ProbeOutcome::Matched,
                Some(_) => ProbeOutcome::Missed,
                None => ProbeOutcome::Skipped,
            },
            Probe::Template {
                zone,
                template,
                threshold,
                ..
            } => {
                let area = zone.unwrap_or(Rect::new(0, 0, frame.width(), frame.height()));
                match template.best_score(frame, &area, *threshold) {
                    Some(score) if score >= *threshold => ProbeOutcome::Matched,
                    Some(_) => ProbeOutcome::Missed,
                    None => ProbeOutcome::Skipped,
                }
            }
        }
    }
}

/// Mean RGB over the half-open `zone`, or `None` unless it lies inside the frame.
pub fn mean_color(frame: &Frame, zone: &Rect) -> Option<[f64; 3]> {
    if !frame.contains_rect(zone) {
        return None;
    }
    let mut sum = [0u64; 3];
    for y in zone.y1..zone.y2 {
        for x in zone.x1..zone.x2 {
            let px = frame.pixel(x, y)?;
            for (s, &c) in sum.iter_mut().zip(px.iter()) {
                *s += u64::from(c);
            }
        }
    }
    let n = zone.area() as f64;
    Some([sum[0] as f64 / n, sum[1] as f64 / n, sum[2] as f64 / n])
}
