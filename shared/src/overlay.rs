//! Turns detections into a flat list of drawable shapes for one surface.
//!
//! Shapes are emitted in detection order, a rectangle followed by its
//! label, so later detections paint over earlier ones.

use serde::{Deserialize, Serialize};

use crate::config::ViewerConfig;
use crate::detection::Detection;
use crate::geometry::{CoordinateMapper, DisplayRect, DisplaySize, NativeResolution};
use crate::palette::{color_for, Color};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawableShape {
    Rect {
        detection_index: usize,
        rect: DisplayRect,
        stroke: Color,
        stroke_width: u32,
    },
    Label {
        detection_index: usize,
        x: f64,
        y: f64,
        text: String,
        color: Color,
        font_size: f64,
    },
}

impl DrawableShape {
    #[must_use]
    pub fn detection_index(&self) -> usize {
        match self {
            Self::Rect {
                detection_index, ..
            }
            | Self::Label {
                detection_index, ..
            } => *detection_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub stroke_width: u32,
    pub label_offset: f64,
    pub font_size: f64,
}

impl From<&ViewerConfig> for OverlayStyle {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            stroke_width: config.stroke_width,
            label_offset: config.label_offset,
            font_size: config.label_font_size,
        }
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

/// `"<class> (<confidence%>)"` with one decimal, e.g. `"RBC (92.0%)"`.
#[must_use]
pub fn format_label(detection: &Detection) -> String {
    format!(
        "{} ({:.1}%)",
        detection.class_name,
        detection.confidence * 100.0
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRenderer {
    native: NativeResolution,
    style: OverlayStyle,
}

impl OverlayRenderer {
    #[must_use]
    pub fn new(native: NativeResolution, style: OverlayStyle) -> Self {
        Self { native, style }
    }

    #[must_use]
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(config.native_resolution, OverlayStyle::from(config))
    }

    /// Two shapes per detection. Empty input or an undrawable surface gives
    /// no shapes.
    #[must_use]
    pub fn render(&self, detections: &[Detection], surface: DisplaySize) -> Vec<DrawableShape> {
        if detections.is_empty() || !surface.is_drawable() {
            return Vec::new();
        }

        let mapper = CoordinateMapper::new(self.native, surface);
        let mut shapes = Vec::with_capacity(detections.len() * 2);

        for (detection_index, detection) in detections.iter().enumerate() {
            let rect = mapper.map(&detection.bbox);
            let color = color_for(&detection.class_name);

            shapes.push(DrawableShape::Rect {
                detection_index,
                rect,
                stroke: color,
                stroke_width: self.style.stroke_width,
            });
            shapes.push(DrawableShape::Label {
                detection_index,
                x: rect.x,
                y: rect.y - self.style.label_offset,
                text: format_label(detection),
                color,
                font_size: self.style.font_size,
            });
        }

        tracing::trace!(
            detections = detections.len(),
            width = surface.width,
            height = surface.height,
            "overlay rendered"
        );
        shapes
    }
}

#[must_use]
pub fn render(
    detections: &[Detection],
    native: NativeResolution,
    surface: DisplaySize,
) -> Vec<DrawableShape> {
    OverlayRenderer::new(native, OverlayStyle::default()).render(detections, surface)
}

/// Detection whose rectangle contains the point. When boxes overlap the
/// one drawn last wins.
#[must_use]
pub fn hit_test(shapes: &[DrawableShape], x: f64, y: f64) -> Option<usize> {
    shapes.iter().rev().find_map(|shape| match shape {
        DrawableShape::Rect {
            detection_index,
            rect,
            ..
        } if rect.contains(x, y) => Some(*detection_index),
        _ => None,
    })
}
