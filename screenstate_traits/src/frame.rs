/// Axis-aligned rectangle in frame pixel coordinates.
///
/// Half-open on both axes: covers `x1..x2` and `y1..y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rect {
    #[inline]
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from the `[x1, y1, x2, y2]` array form used in config files.
    #[inline]
    pub const fn from_corners(c: [u32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    #[inline]
    pub const fn corners(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// True when the rectangle covers at least one pixel.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }

    /// Number of pixels covered (0 for inverted rectangles).
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }
}

/// One captured screen image: immutable, row-major RGB8.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Frame {
    /// Wrap a raw RGB8 buffer. Returns `None` if the length does not match
    /// `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(3)?;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Single-color frame.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from_fn(width, height, |_, _| rgb)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw row-major RGB8 bytes.
    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// True when `r` is well formed and lies entirely inside the frame.
    #[inline]
    pub fn contains_rect(&self, r: &Rect) -> bool {
        r.is_well_formed() && r.x2 <= self.width && r.y2 <= self.height
    }

    /// RGB at `(x, y)`, or `None` outside the frame.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if !self.contains(x, y) {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    /// ITU-R BT.601 luma at `(x, y)` as a float in 0.0..=255.0.
    #[inline]
    pub fn luma(&self, x: u32, y: u32) -> Option<f32> {
        self.pixel(x, y).map(luma_of)
    }

    /// Copy out a sub-rectangle. `None` unless `r` lies inside the frame.
    pub fn crop(&self, r: &Rect) -> Option<Frame> {
        if !self.contains_rect(r) {
            return None;
        }
        let mut pixels = Vec::with_capacity(r.area() as usize * 3);
        for y in r.y1..r.y2 {
            let start = (y as usize * self.width as usize + r.x1 as usize) * 3;
            let end = start + r.width() as usize * 3;
            pixels.extend_from_slice(&self.pixels[start..end]);
        }
        Some(Frame {
            width: r.width(),
            height: r.height(),
            pixels,
        })
    }
}

/// Y = 0.299*R + 0.587*G + 0.114*B
#[inline]
pub fn luma_of(rgb: [u8; 3]) -> f32 {
    0.299 * f32::from(rgb[0]) + 0.587 * f32::from(rgb[1]) + 0.114 * f32::from(rgb[2])
}
