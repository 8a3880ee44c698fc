use std::fmt;
use std::io::Cursor;

use ab_glyph::{FontArc, PxScale};
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, Limits, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::ViewerConfig;
use crate::geometry::{DisplayRect, DisplaySize};
use crate::overlay::DrawableShape;
use crate::palette::Color;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to decode base image: {source}")]
    Decode {
        #[from]
        source: image::ImageError,
    },

    #[error("png encoding failed: width={width}, height={height}, reason={reason}")]
    PngEncode {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("input too large: {size} bytes, max {max_size}")]
    InputTooLarge { size: usize, max_size: usize },

    #[error("input bytes empty")]
    EmptyInput,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("export surface {width}x{height} is not drawable (max side {max_dimension})")]
    InvalidSurface {
        width: f64,
        height: f64,
        max_dimension: u32,
    },

    #[error("label font could not be parsed")]
    InvalidFont,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_input_bytes: usize,
    pub max_dimension: u32,
    pub max_alloc_bytes: u64,
}

impl From<&ViewerConfig> for DecodeLimits {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            max_input_bytes: config.max_input_bytes,
            max_dimension: config.max_dimension,
            max_alloc_bytes: config.max_alloc_bytes,
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

/// Font used to rasterize labels on export.
#[derive(Clone)]
pub struct LabelFont(FontArc);

impl LabelFont {
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidFont`] if `bytes` is not a TrueType or
    /// OpenType font.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ExportError> {
        FontArc::try_from_vec(bytes)
            .map(Self)
            .map_err(|_| ExportError::InvalidFont)
    }
}

impl fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LabelFont(..)")
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    pub limits: DecodeLimits,
    /// Labels are skipped when no font is loaded.
    pub font: Option<LabelFont>,
}

impl ExportOptions {
    #[must_use]
    pub fn new(config: &ViewerConfig, font: Option<LabelFont>) -> Self {
        Self {
            limits: DecodeLimits::from(config),
            font,
        }
    }
}

/// Composites `shapes` onto `base_image` scaled to `surface` and returns
/// the result as PNG bytes.
///
/// # Errors
///
/// Fails if the base image cannot be decoded within `options.limits`, if
/// `surface` is not drawable, or if encoding fails.
#[instrument(
    skip(base_image, shapes, options),
    fields(input_size = base_image.len(), shapes = shapes.len())
)]
pub fn export_view(
    base_image: &[u8],
    surface: DisplaySize,
    shapes: &[DrawableShape],
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let (width, height) = surface_pixels(surface, options.limits.max_dimension)?;

    let img = decode_image(&options.limits, base_image)?;
    let mut canvas = img
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgba8();

    let mut skipped_labels = 0usize;
    for shape in shapes {
        match shape {
            DrawableShape::Rect {
                rect,
                stroke,
                stroke_width,
                ..
            } => stroke_rect(&mut canvas, rect, *stroke, *stroke_width),
            DrawableShape::Label {
                x,
                y,
                text,
                color,
                font_size,
                ..
            } => match &options.font {
                Some(LabelFont(font)) => draw_text_mut(
                    &mut canvas,
                    Rgba(color.to_rgba()),
                    label_px(*x),
                    label_px(*y),
                    PxScale::from(*font_size as f32),
                    font,
                    text,
                ),
                None => skipped_labels += 1,
            },
        }
    }

    if skipped_labels > 0 {
        debug!(skipped_labels, "no label font loaded, labels omitted");
    }

    encode_png(&DynamicImage::ImageRgba8(canvas))
}

fn surface_pixels(surface: DisplaySize, max_dimension: u32) -> Result<(u32, u32), ExportError> {
    let invalid = || ExportError::InvalidSurface {
        width: surface.width,
        height: surface.height,
        max_dimension,
    };

    if !surface.is_drawable() {
        return Err(invalid());
    }

    let max = f64::from(max_dimension);
    let (w, h) = (surface.width.round(), surface.height.round());
    if w > max || h > max {
        return Err(invalid());
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok((w as u32, h as u32))
}

/// Label anchors further out than this are off any canvas we produce.
const LABEL_COORD_LIMIT: i64 = 1 << 24;

#[allow(clippy::cast_possible_truncation)]
fn to_canvas(v: f64, min: i64, max: i64) -> i64 {
    (v.round() as i64).clamp(min, max)
}

fn label_px(v: f64) -> i32 {
    let clamped = to_canvas(v, -LABEL_COORD_LIMIT, LABEL_COORD_LIMIT);
    i32::try_from(clamped).unwrap_or(0)
}

/// Strokes `rect` as nested one-pixel outlines centered on its edge. Edges
/// that lie far off the canvas are pulled in to just outside it.
fn stroke_rect(canvas: &mut RgbaImage, rect: &DisplayRect, color: Color, stroke_width: u32) {
    let pixel = Rgba(color.to_rgba());
    let stroke = i64::from(stroke_width.max(1));
    let half = stroke / 2;
    let margin = stroke + 1;

    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let left = to_canvas(rect.x, -margin, cw + margin);
    let top = to_canvas(rect.y, -margin, ch + margin);
    let right = to_canvas(rect.right(), -margin, cw + margin);
    let bottom = to_canvas(rect.bottom(), -margin, ch + margin);
    let (w, h) = (right - left, bottom - top);

    for inset in -half..(stroke - half) {
        let (iw, ih) = (w - 2 * inset, h - 2 * inset);
        if iw <= 0 || ih <= 0 {
            break;
        }
        let (Ok(x), Ok(y), Ok(iw), Ok(ih)) = (
            i32::try_from(left + inset),
            i32::try_from(top + inset),
            u32::try_from(iw),
            u32::try_from(ih),
        ) else {
            break;
        };
        draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(iw, ih), pixel);
    }
}

fn decode_image(limits: &DecodeLimits, raw_bytes: &[u8]) -> Result<DynamicImage, ExportError> {
    if raw_bytes.is_empty() {
        return Err(ExportError::EmptyInput);
    }

    if raw_bytes.len() > limits.max_input_bytes {
        return Err(ExportError::InputTooLarge {
            size: raw_bytes.len(),
            max_size: limits.max_input_bytes,
        });
    }

    let mut reader = ImageReader::new(Cursor::new(raw_bytes))
        .with_guessed_format()
        .map_err(|e| ExportError::Decode { source: e.into() })?;

    if reader.format().is_none() {
        return Err(ExportError::UnsupportedFormat);
    }

    let mut decode_limits = Limits::default();
    decode_limits.max_image_width = Some(limits.max_dimension);
    decode_limits.max_image_height = Some(limits.max_dimension);
    decode_limits.max_alloc = Some(limits.max_alloc_bytes);
    reader.limits(decode_limits);

    reader.decode().map_err(|e| {
        warn!(error = %e, "base image decode failed");
        ExportError::from(e)
    })
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ExportError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| ExportError::PngEncode {
            width,
            height,
            reason: e.to_string(),
        })?;

    if buffer.len() < PNG_MAGIC.len() || &buffer[..PNG_MAGIC.len()] != PNG_MAGIC {
        return Err(ExportError::PngEncode {
            width,
            height,
            reason: "invalid png magic bytes".into(),
        });
    }

    Ok(buffer)
}
