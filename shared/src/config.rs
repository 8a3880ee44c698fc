use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{DisplaySize, NativeResolution};
use crate::timeline::MIN_VISIBLE_HEIGHT_PCT;

pub const DEFAULT_NATIVE_SIDE: u32 = 300;
pub const DEFAULT_MAX_DISPLAY_WIDTH: f64 = 600.0;
pub const DEFAULT_VIEWPORT_MARGIN: f64 = 40.0;
pub const DEFAULT_SURFACE: DisplaySize = DisplaySize::new(800.0, 600.0);
pub const DEFAULT_LABEL_OFFSET: f64 = 25.0;
pub const DEFAULT_LABEL_FONT_SIZE: f64 = 14.0;
pub const DEFAULT_STROKE_WIDTH: u32 = 3;
pub const DEFAULT_EXPORT_FILE_NAME: &str = "blood_cell_detection_result.png";
pub const MAX_STROKE_WIDTH: u32 = 32;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("native resolution {width}x{height} has a zero dimension")]
    ZeroResolution { width: u32, height: u32 },

    #[error("invalid `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("config parse failed: {0}")]
    Parse(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Everything the overlay core needs from its host. Missing JSON fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub native_resolution: NativeResolution,
    pub max_display_width: f64,
    pub viewport_margin: f64,
    /// Surface used until the displayed image reports its natural size.
    pub default_surface: DisplaySize,
    pub label_offset: f64,
    pub label_font_size: f64,
    pub stroke_width: u32,
    pub min_timeline_height_pct: f64,
    pub export_file_name: String,
    pub max_input_bytes: usize,
    pub max_dimension: u32,
    pub max_alloc_bytes: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            native_resolution: NativeResolution::default(),
            max_display_width: DEFAULT_MAX_DISPLAY_WIDTH,
            viewport_margin: DEFAULT_VIEWPORT_MARGIN,
            default_surface: DEFAULT_SURFACE,
            label_offset: DEFAULT_LABEL_OFFSET,
            label_font_size: DEFAULT_LABEL_FONT_SIZE,
            stroke_width: DEFAULT_STROKE_WIDTH,
            min_timeline_height_pct: MIN_VISIBLE_HEIGHT_PCT,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            max_input_bytes: 50 * 1024 * 1024,
            max_dimension: 15_000,
            max_alloc_bytes: 512 * 1024 * 1024,
        }
    }
}

impl ViewerConfig {
    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroResolution`] for a zero native dimension,
    /// [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidValue`] for out-of-range fields.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        // serde flattens the zero-resolution error into a string; recover it
        let config: Self = serde_json::from_str(json).map_err(|e| {
            parse_zero_resolution(json).unwrap_or_else(|| ConfigError::Parse(e.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_display_width.is_finite() || self.max_display_width <= 0.0 {
            return Err(invalid("max_display_width", "must be a positive number"));
        }
        if !self.viewport_margin.is_finite() || self.viewport_margin < 0.0 {
            return Err(invalid("viewport_margin", "must be zero or positive"));
        }
        if !self.default_surface.is_drawable() {
            return Err(invalid("default_surface", "must be at least 1x1"));
        }
        if !self.label_offset.is_finite() {
            return Err(invalid("label_offset", "must be finite"));
        }
        if !self.label_font_size.is_finite() || self.label_font_size <= 0.0 {
            return Err(invalid("label_font_size", "must be a positive number"));
        }
        if self.stroke_width == 0 || self.stroke_width > MAX_STROKE_WIDTH {
            return Err(invalid(
                "stroke_width",
                format!("must be in [1, {MAX_STROKE_WIDTH}]"),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_timeline_height_pct) {
            return Err(invalid("min_timeline_height_pct", "must be in [0, 100]"));
        }
        if self.export_file_name.trim().is_empty() {
            return Err(invalid("export_file_name", "must not be empty"));
        }
        if self.max_input_bytes == 0 || self.max_dimension == 0 || self.max_alloc_bytes == 0 {
            return Err(invalid("decode limits", "must be non-zero"));
        }
        Ok(())
    }
}

fn parse_zero_resolution(json: &str) -> Option<ConfigError> {
    #[derive(Deserialize)]
    struct Probe {
        native_resolution: Option<RawSize>,
    }
    #[derive(Deserialize)]
    struct RawSize {
        width: u32,
        height: u32,
    }

    let probe: Probe = serde_json::from_str(json).ok()?;
    let raw = probe.native_resolution?;
    NativeResolution::new(raw.width, raw.height).err()
}
