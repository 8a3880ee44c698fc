use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, DEFAULT_NATIVE_SIDE};

/// Fixed input resolution of the detector. Every bbox coordinate is
/// expressed in this space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawResolution")]
pub struct NativeResolution {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct RawResolution {
    width: u32,
    height: u32,
}

impl TryFrom<RawResolution> for NativeResolution {
    type Error = ConfigError;

    fn try_from(raw: RawResolution) -> Result<Self, Self::Error> {
        Self::new(raw.width, raw.height)
    }
}

impl Default for NativeResolution {
    fn default() -> Self {
        Self {
            width: DEFAULT_NATIVE_SIDE,
            height: DEFAULT_NATIVE_SIDE,
        }
    }
}

impl NativeResolution {
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroResolution`] if either side is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroResolution { width, height });
        }
        Ok(Self { width, height })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroResolution`] if `side` is zero.
    pub fn square(side: u32) -> Result<Self, ConfigError> {
        Self::new(side, side)
    }

    #[must_use]
    pub const fn width(self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(self) -> u32 {
        self.height
    }
}

/// Size of the surface the overlay is drawn on, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn scaled(self, k: f64) -> Self {
        Self::new(self.width * k, self.height * k)
    }

    #[must_use]
    pub fn is_drawable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width >= 1.0 && self.height >= 1.0
    }
}

impl From<NativeResolution> for DisplaySize {
    fn from(native: NativeResolution) -> Self {
        Self::new(f64::from(native.width), f64::from(native.height))
    }
}

/// Axis-aligned rectangle in display pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Edges are inclusive so a click on the stroke still hits.
    #[must_use]
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    #[must_use]
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            x: self.x * k,
            y: self.y * k,
            width: self.width * k,
            height: self.height * k,
        }
    }
}

/// Per-axis scale from native detector space onto one display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMapper {
    #[must_use]
    pub fn new(native: NativeResolution, display: DisplaySize) -> Self {
        Self {
            scale_x: display.width / f64::from(native.width),
            scale_y: display.height / f64::from(native.height),
        }
    }

    #[must_use]
    pub fn map(&self, bbox: &[f64; 4]) -> DisplayRect {
        let [x1, y1, x2, y2] = *bbox;
        DisplayRect {
            x: x1 * self.scale_x,
            y: y1 * self.scale_y,
            width: (x2 - x1) * self.scale_x,
            height: (y2 - y1) * self.scale_y,
        }
    }
}

#[must_use]
pub fn map_box(bbox: &[f64; 4], native: NativeResolution, display: DisplaySize) -> DisplayRect {
    CoordinateMapper::new(native, display).map(bbox)
}

/// Display size for an image of `image_width`x`image_height` given the
/// available width budget `min(max_width, viewport_width - margin)`.
/// Aspect ratio is preserved; a degenerate image falls back to a square.
#[must_use]
pub fn fit_display_size(
    image_width: u32,
    image_height: u32,
    viewport_width: Option<f64>,
    max_width: f64,
    margin: f64,
) -> DisplaySize {
    let available = viewport_width.map_or(max_width, |vw| (vw - margin).min(max_width));
    let width = available.max(0.0);

    if image_width == 0 || image_height == 0 {
        return DisplaySize::new(width, width);
    }

    let aspect = f64::from(image_height) / f64::from(image_width);
    DisplaySize::new(width, width * aspect)
}
