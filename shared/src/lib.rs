#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod config;
pub mod detection;
pub mod event;
pub mod geometry;
pub mod image_processing;
pub mod model;
pub mod navigator;
pub mod overlay;
pub mod palette;
pub mod stats;
pub mod timeline;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{ConfigError, ViewerConfig};
pub use crux_core::{render::Render, App as CruxApp};
pub use detection::{
    Detection, FrameResult, ImageDetectionResult, ImageRef, PayloadError, ResultWarning,
    VideoDetectionResult,
};
pub use event::Event;
pub use geometry::{map_box, CoordinateMapper, DisplayRect, DisplaySize, NativeResolution};
pub use image_processing::{export_view, ExportError, ExportOptions, LabelFont};
pub use model::{AnalysisMode, ExportStatus, Model};
pub use navigator::{FrameNavigator, NavigationState};
pub use overlay::{hit_test, DrawableShape, OverlayRenderer};
pub use palette::{color_for, Color, KnownClass};

use capabilities::SaveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Analysis,
    ImageProcessing,
    ImageTooLarge,
    ImageFormatUnsupported,
    Export,
    InvalidState,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Analysis => "ANALYSIS_FAILED",
            Self::ImageProcessing => "IMAGE_PROCESSING_ERROR",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::ImageFormatUnsupported => "IMAGE_FORMAT_UNSUPPORTED",
            Self::Export => "EXPORT_ERROR",
            Self::InvalidState => "INVALID_STATE",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Analysis | Self::Export => ErrorSeverity::Transient,

            Self::Configuration => ErrorSeverity::Fatal,

            Self::Validation
            | Self::ImageProcessing
            | Self::ImageTooLarge
            | Self::ImageFormatUnsupported
            | Self::InvalidState => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Analysis | Self::Export)
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Configuration => "Configuration Error",
            Self::Validation => "Invalid Result",
            Self::Analysis => "Analysis Failed",
            Self::ImageProcessing | Self::ImageTooLarge | Self::ImageFormatUnsupported => {
                "Image Error"
            }
            Self::Export => "Export Failed",
            Self::InvalidState => "Not Available",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Configuration => {
                format!("The viewer is misconfigured: {}", self.message)
            }
            ErrorKind::Validation => {
                "The analysis result was incomplete or inconsistent. Please run the analysis again."
                    .into()
            }
            ErrorKind::Analysis => format!("Analysis failed: {}", self.message),
            ErrorKind::ImageProcessing => {
                "Unable to process the image. Please try a different file.".into()
            }
            ErrorKind::ImageTooLarge => "The image is too large to export.".into(),
            ErrorKind::ImageFormatUnsupported => {
                "This image format is not supported. Please use JPEG, PNG, or WebP.".into()
            }
            ErrorKind::Export => "The result could not be saved. Please try again.".into(),
            ErrorKind::InvalidState => self.message.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        let field = match &e {
            ConfigError::ZeroResolution { .. } => "native_resolution",
            ConfigError::InvalidValue { field, .. } => *field,
            ConfigError::Parse(_) => "document",
        };
        AppError::new(ErrorKind::Configuration, e.to_string()).with_context("field", field)
    }
}

impl From<PayloadError> for AppError {
    fn from(e: PayloadError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        let kind = match &e {
            ExportError::InputTooLarge { .. } => ErrorKind::ImageTooLarge,
            ExportError::UnsupportedFormat => ErrorKind::ImageFormatUnsupported,
            ExportError::Decode { .. } | ExportError::EmptyInput | ExportError::InvalidFont => {
                ErrorKind::ImageProcessing
            }
            ExportError::PngEncode { .. } => ErrorKind::Export,
            ExportError::InvalidSurface { .. } => ErrorKind::InvalidState,
        };
        AppError::new(kind, "Export failed").with_internal(e.to_string())
    }
}

impl From<SaveError> for AppError {
    fn from(e: SaveError) -> Self {
        AppError::new(ErrorKind::Export, e.to_string())
    }
}

// --- Display formatting ---

/// `"92.35%"`, two decimals, for the detail panel.
#[must_use]
pub fn format_confidence_detail(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

/// `"92.3%"`, one decimal, for list rows.
#[must_use]
pub fn format_confidence_row(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Top-left corner rounded to whole pixels, `"(10, 20)"`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_position(bbox: &[f64; 4]) -> String {
    format!(
        "({}, {})",
        bbox[0].round() as i64,
        bbox[1].round() as i64
    )
}

#[must_use]
pub fn format_frame_label(index: usize, frame_count: usize, detections: usize) -> String {
    format!("Frame {}/{frame_count} ({detections} detections)", index + 1)
}

#[must_use]
pub fn format_timeline_title(index: usize, detections: usize) -> String {
    format!("Frame {}: {detections} detections", index + 1)
}

#[must_use]
pub fn format_share_label(count: usize, percentage: f64) -> String {
    format!("{count} ({percentage:.1}%)")
}

#[must_use]
pub fn format_average(average: f64) -> String {
    format!("{average:.1}")
}

// --- View model ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LegendEntry {
    pub class_name: String,
    pub color: String,
}

#[must_use]
pub fn legend() -> Vec<LegendEntry> {
    KnownClass::ALL
        .into_iter()
        .map(|class| LegendEntry {
            class_name: class.name().to_string(),
            color: class.color().hex(),
        })
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassCountView {
    pub class_name: String,
    pub count: usize,
    pub color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionDetailView {
    pub class_name: String,
    pub confidence_text: String,
    pub position_text: String,
    pub color: String,
}

impl From<&Detection> for DetectionDetailView {
    fn from(d: &Detection) -> Self {
        Self {
            class_name: d.class_name.clone(),
            confidence_text: format_confidence_detail(d.confidence),
            position_text: format_position(&d.bbox),
            color: color_for(&d.class_name).hex(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionRowView {
    pub class_name: String,
    pub confidence_text: String,
    pub position_text: String,
    pub color: String,
}

impl From<&Detection> for DetectionRowView {
    fn from(d: &Detection) -> Self {
        Self {
            class_name: d.class_name.clone(),
            confidence_text: format_confidence_row(d.confidence),
            position_text: format_position(&d.bbox),
            color: color_for(&d.class_name).hex(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageView {
    pub image: String,
    pub surface: DisplaySize,
    pub shapes: Vec<DrawableShape>,
    pub total_detections: usize,
    pub class_counts: Vec<ClassCountView>,
    pub excluded_count: usize,
    pub selected: Option<DetectionDetailView>,
    pub legend: Vec<LegendEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassShareView {
    pub class_name: String,
    pub count: usize,
    pub percentage: f64,
    pub label: String,
    pub color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NavigationView {
    pub label: String,
    pub selected_index: usize,
    pub frame_count: usize,
    pub can_prev: bool,
    pub can_next: bool,
    pub show_overlay: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrameView {
    pub index: usize,
    pub timestamp: String,
    pub image: String,
    pub surface: DisplaySize,
    pub shapes: Vec<DrawableShape>,
    pub detections: Vec<DetectionRowView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelineBarView {
    pub index: usize,
    pub height_pct: f64,
    pub is_active: bool,
    pub title: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoView {
    pub total_frames: usize,
    pub total_detections: usize,
    pub average_text: String,
    pub distribution: Vec<ClassShareView>,
    pub navigation: Option<NavigationView>,
    pub current_frame: Option<FrameView>,
    pub timeline: Vec<TimelineBarView>,
    pub selected: Option<DetectionDetailView>,
    pub legend: Vec<LegendEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Idle { mode: AnalysisMode },
    Image(ImageView),
    Video(VideoView),
    Error { title: String, message: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub is_dismissible: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            is_dismissible: e.severity != ErrorSeverity::Fatal,
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub error: Option<UserFacingError>,
    pub warnings: Vec<String>,
    pub is_loading: bool,
    pub last_export: Option<ExportStatus>,
}

pub mod app {
    use super::*;
    use crate::model::AnalysisResult;
    use crate::stats::{ImageSummary, VideoSummary};
    use crate::timeline;
    use tracing::{debug, info, warn};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn configure(model: &mut Model, config: ViewerConfig) {
            match model.apply_config(config) {
                Ok(()) => info!(
                    native_width = model.config.native_resolution.width(),
                    native_height = model.config.native_resolution.height(),
                    "viewer configured"
                ),
                Err(e) => {
                    warn!(error = %e, "configuration rejected");
                    model.set_error(e);
                }
            }
        }

        fn start_export(model: &mut Model, caps: &Capabilities, base_image: &[u8]) {
            let file_name = model.config.export_file_name.clone();

            match model.export_current_view(base_image) {
                Ok(png) => {
                    info!(bytes = png.len(), file = %file_name, "export composed");
                    model.last_export = Some(ExportStatus::Pending {
                        file_name: file_name.clone(),
                    });
                    caps.export
                        .save_image(file_name.clone(), png, move |result| {
                            Event::ExportFinished { file_name, result }
                        });
                }
                Err(e) => {
                    warn!(error = %e, "export failed");
                    model.last_export = Some(ExportStatus::Failed {
                        file_name,
                        message: e.user_facing_message(),
                    });
                    model.set_error(e);
                }
            }
        }

        fn build_image_view(model: &Model, result: &ImageDetectionResult) -> ImageView {
            let summary = ImageSummary::new(&result.detections);

            ImageView {
                image: result.processed_image.as_str().to_string(),
                surface: model.display_surface(),
                shapes: model.current_shapes(),
                total_detections: summary.total,
                class_counts: summary
                    .breakdown
                    .iter()
                    .map(|(class, count)| ClassCountView {
                        class_name: class.name().to_string(),
                        count,
                        color: class.color().hex(),
                    })
                    .collect(),
                excluded_count: summary.excluded,
                selected: model.selected_detection.as_ref().map(DetectionDetailView::from),
                legend: legend(),
            }
        }

        fn build_video_view(model: &Model, result: &VideoDetectionResult) -> VideoView {
            let summary = VideoSummary::new(result);
            let current = model.navigator.current();
            let frame = model.current_frame();

            let navigation = frame.map(|frame| {
                let nav = model.navigator.state();
                NavigationView {
                    label: format_frame_label(
                        nav.selected_index,
                        model.navigator.frame_count(),
                        frame.detection_count,
                    ),
                    selected_index: nav.selected_index,
                    frame_count: model.navigator.frame_count(),
                    can_prev: model.navigator.can_prev(),
                    can_next: model.navigator.can_next(),
                    show_overlay: nav.show_overlay,
                }
            });

            let current_frame = frame.map(|frame| {
                let image = if model.navigator.show_overlay() {
                    &frame.frame_image
                } else {
                    &frame.original_frame
                };
                FrameView {
                    index: frame.index,
                    timestamp: frame.timestamp.clone(),
                    image: image.as_str().to_string(),
                    surface: model.display_surface(),
                    shapes: model.current_shapes(),
                    detections: frame.detections.iter().map(DetectionRowView::from).collect(),
                }
            });

            let timeline = timeline::bars(&result.frame_results, model.config.min_timeline_height_pct)
                .into_iter()
                .map(|bar| TimelineBarView {
                    index: bar.index,
                    height_pct: bar.height_pct,
                    is_active: current == Some(bar.index),
                    title: format_timeline_title(bar.index, bar.count),
                })
                .collect();

            VideoView {
                total_frames: summary.frames,
                total_detections: summary.total_detections,
                average_text: format_average(summary.average_per_frame),
                distribution: summary
                    .distribution
                    .into_iter()
                    .map(|share| ClassShareView {
                        label: format_share_label(share.count, share.percentage),
                        color: color_for(&share.class_name).hex(),
                        class_name: share.class_name,
                        count: share.count,
                        percentage: share.percentage,
                    })
                    .collect(),
                navigation,
                current_frame,
                timeline,
                selected: model.selected_detection.as_ref().map(DetectionDetailView::from),
                legend: legend(),
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(
                event = event.name(),
                user_initiated = event.is_user_initiated(),
                "dispatch"
            );

            match event {
                Event::Configure(config) => Self::configure(model, *config),

                Event::ConfigureFromJson { json } => match ViewerConfig::from_json(&json) {
                    Ok(config) => Self::configure(model, config),
                    Err(e) => {
                        warn!(error = %e, "configuration document rejected");
                        model.set_error(e.into());
                    }
                },

                Event::FontLoaded { bytes } => match LabelFont::from_bytes(bytes) {
                    Ok(font) => model.label_font = Some(font),
                    Err(e) => {
                        warn!(error = %e, "label font rejected");
                        model.set_error(e.into());
                    }
                },

                Event::ModeSelected(mode) => {
                    if model.result.is_none() {
                        model.mode = mode;
                    }
                }

                Event::AnalysisStarted => {
                    model.is_loading = true;
                    model.clear_error();
                }

                Event::ImageAnalysisCompleted(result) => {
                    model.is_loading = false;
                    if let Err(e) = model.load_image_result(*result) {
                        warn!(error = %e, "image result rejected");
                        model.set_error(e);
                    }
                }

                Event::VideoAnalysisCompleted(result) => {
                    model.is_loading = false;
                    if let Err(e) = model.load_video_result(*result) {
                        warn!(error = %e, "video result rejected");
                        model.set_error(e);
                    }
                }

                Event::AnalysisFailed { message } => {
                    model.is_loading = false;
                    warn!(%message, "analysis failed");
                    model.set_error(AppError::new(ErrorKind::Analysis, message));
                }

                Event::DisplayImageLoaded { width, height } => {
                    model.surface.image_size = Some((width, height));
                }

                Event::ViewportResized { width } => {
                    if width.is_finite() && width >= 0.0 {
                        model.surface.viewport_width = Some(width);
                    }
                }

                Event::DetectionSelected(detection) => {
                    model.selected_detection = Some(*detection);
                }

                Event::DetectionSelectedAt { x, y } => {
                    model.select_at(x, y);
                }

                Event::SelectionCleared => model.selected_detection = None,

                Event::FrameSelected { index } => {
                    if !model.select_frame(index) {
                        debug!(index, "frame selection unchanged");
                    }
                }

                Event::NextFrame => {
                    model.next_frame();
                }

                Event::PreviousFrame => {
                    model.previous_frame();
                }

                Event::OverlayToggled { enabled } => model.navigator.set_overlay(enabled),

                Event::ExportRequested { base_image } => {
                    Self::start_export(model, caps, &base_image);
                }

                Event::ExportFinished { file_name, result } => {
                    model.finish_export(file_name, result);
                }

                Event::ErrorDismissed => {
                    model.clear_error();
                }

                Event::Reset => model.reset(),
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            let fatal = model
                .active_error
                .as_ref()
                .filter(|e| e.severity == ErrorSeverity::Fatal);

            let state = match (fatal, &model.result) {
                (Some(error), _) => ViewState::Error {
                    title: error.kind.title().into(),
                    message: error.user_facing_message(),
                },
                (None, None) => ViewState::Idle { mode: model.mode },
                (None, Some(AnalysisResult::Image(result))) => {
                    ViewState::Image(Self::build_image_view(model, result))
                }
                (None, Some(AnalysisResult::Video(result))) => {
                    ViewState::Video(Self::build_video_view(model, result))
                }
            };

            ViewModel {
                state,
                error: model.active_error.as_ref().map(UserFacingError::from),
                warnings: model.warnings.iter().map(ResultWarning::message).collect(),
                is_loading: model.is_loading,
                last_export: model.last_export.clone(),
            }
        }
    }
}
