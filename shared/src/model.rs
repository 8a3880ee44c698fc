use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capabilities::{ExportOutput, SaveResult};
use crate::config::ViewerConfig;
use crate::detection::{
    Detection, FrameResult, ImageDetectionResult, ResultWarning, VideoDetectionResult,
};
use crate::geometry::{fit_display_size, DisplaySize};
use crate::image_processing::{export_view, ExportOptions, LabelFont};
use crate::navigator::FrameNavigator;
use crate::overlay::{hit_test, DrawableShape, OverlayRenderer};
use crate::{AppError, AppResult, ErrorKind, ErrorSeverity};

#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    Image,
    Video,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisResult {
    Image(ImageDetectionResult),
    Video(VideoDetectionResult),
}

impl AnalysisResult {
    #[must_use]
    pub const fn mode(&self) -> AnalysisMode {
        match self {
            Self::Image(_) => AnalysisMode::Image,
            Self::Video(_) => AnalysisMode::Video,
        }
    }
}

/// What the shell has reported about the display area.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceState {
    pub viewport_width: Option<f64>,
    /// Natural size of the displayed image or frame.
    pub image_size: Option<(u32, u32)>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportStatus {
    Pending {
        file_name: String,
    },
    Saved {
        file_name: String,
        location: Option<String>,
    },
    Cancelled {
        file_name: String,
    },
    Failed {
        file_name: String,
        message: String,
    },
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: ViewerConfig,
    pub mode: AnalysisMode,
    pub result: Option<AnalysisResult>,
    pub navigator: FrameNavigator,
    pub selected_detection: Option<Detection>,
    pub surface: SurfaceState,
    pub warnings: Vec<ResultWarning>,

    // Generic UI state
    pub is_loading: bool,
    pub active_error: Option<AppError>,
    pub last_export: Option<ExportStatus>,

    pub label_font: Option<LabelFont>,
}

impl Model {
    #[must_use]
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Installs a validated config. A previous configuration error is
    /// cleared; on failure the old config stays in place.
    ///
    /// # Errors
    ///
    /// Returns a fatal `Configuration` error if `config` is invalid.
    pub fn apply_config(&mut self, config: ViewerConfig) -> AppResult<()> {
        config.validate()?;
        self.config = config;
        if self
            .active_error
            .as_ref()
            .is_some_and(|e| e.kind == ErrorKind::Configuration)
        {
            self.active_error = None;
        }
        Ok(())
    }

    /// Surface the overlay is drawn on: the displayed image fitted to the
    /// width budget, or the configured default until its size is known.
    #[must_use]
    pub fn display_surface(&self) -> DisplaySize {
        match self.surface.image_size {
            Some((width, height)) => fit_display_size(
                width,
                height,
                self.surface.viewport_width,
                self.config.max_display_width,
                self.config.viewport_margin,
            ),
            None => self.config.default_surface,
        }
    }

    #[must_use]
    pub fn current_frame(&self) -> Option<&FrameResult> {
        match &self.result {
            Some(AnalysisResult::Video(video)) => {
                self.navigator.current().and_then(|i| video.frame(i))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn current_detections(&self) -> &[Detection] {
        match &self.result {
            Some(AnalysisResult::Image(image)) => &image.detections,
            Some(AnalysisResult::Video(_)) => self
                .current_frame()
                .map_or(&[][..], |frame| frame.detections.as_slice()),
            None => &[],
        }
    }

    /// Shapes for the current view. A video frame with the overlay off
    /// has none.
    #[must_use]
    pub fn current_shapes(&self) -> Vec<DrawableShape> {
        if matches!(self.result, Some(AnalysisResult::Video(_))) && !self.navigator.show_overlay()
        {
            return Vec::new();
        }
        OverlayRenderer::from_config(&self.config)
            .render(self.current_detections(), self.display_surface())
    }

    /// # Errors
    ///
    /// Returns a `Validation` error if the payload breaks its invariants;
    /// the current result is left untouched.
    pub fn load_image_result(&mut self, result: ImageDetectionResult) -> AppResult<()> {
        result.validate()?;

        let warnings = result.warnings();
        log_warnings(&warnings);
        info!(
            detections = result.detections.len(),
            "image result loaded"
        );

        self.install(AnalysisResult::Image(result), 0, warnings);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a `Validation` error if the payload breaks its invariants;
    /// the current result is left untouched.
    pub fn load_video_result(&mut self, result: VideoDetectionResult) -> AppResult<()> {
        result.validate()?;

        let warnings = result.warnings();
        log_warnings(&warnings);
        info!(
            frames = result.total_frames_processed,
            detections = result.total_detections,
            "video result loaded"
        );

        let frames = result.frame_results.len();
        self.install(AnalysisResult::Video(result), frames, warnings);
        Ok(())
    }

    fn install(&mut self, result: AnalysisResult, frames: usize, warnings: Vec<ResultWarning>) {
        self.mode = result.mode();
        self.result = Some(result);
        self.navigator.load(frames);
        self.selected_detection = None;
        self.surface.image_size = None;
        self.warnings = warnings;
        self.last_export = None;
        self.is_loading = false;
    }

    /// Selects the topmost detection under the point, or clears the
    /// selection on a miss.
    pub fn select_at(&mut self, x: f64, y: f64) -> Option<usize> {
        let hit = hit_test(&self.current_shapes(), x, y);
        self.selected_detection = hit.and_then(|i| self.current_detections().get(i).cloned());
        hit
    }

    /// Moves to `index`, clamped to the last frame. The selection belongs
    /// to the old frame and is dropped when the frame changes.
    pub fn select_frame(&mut self, index: usize) -> bool {
        let before = self.navigator.current();
        let moved = self.navigator.goto(index);
        self.after_frame_change(before);
        moved
    }

    pub fn next_frame(&mut self) -> bool {
        let before = self.navigator.current();
        let moved = self.navigator.next();
        self.after_frame_change(before);
        moved
    }

    pub fn previous_frame(&mut self) -> bool {
        let before = self.navigator.current();
        let moved = self.navigator.prev();
        self.after_frame_change(before);
        moved
    }

    /// Frames of one video share a resolution, so the reported image size
    /// carries over.
    fn after_frame_change(&mut self, before: Option<usize>) {
        if self.navigator.current() != before {
            self.selected_detection = None;
        }
    }

    /// Back to the empty state. Config, font and viewport survive.
    pub fn reset(&mut self) {
        self.result = None;
        self.navigator.load(0);
        self.selected_detection = None;
        self.surface.image_size = None;
        self.warnings.clear();
        self.last_export = None;
        self.is_loading = false;
        self.clear_error();
    }

    /// PNG of the current view composited over `base_image`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` with nothing loaded, or the export failure.
    pub fn export_current_view(&self, base_image: &[u8]) -> AppResult<Vec<u8>> {
        if self.result.is_none() {
            return Err(AppError::new(
                ErrorKind::InvalidState,
                "Nothing to export yet",
            ));
        }

        let options = ExportOptions::new(&self.config, self.label_font.clone());
        let png = export_view(
            base_image,
            self.display_surface(),
            &self.current_shapes(),
            &options,
        )?;
        Ok(png)
    }

    pub fn finish_export(&mut self, file_name: String, result: SaveResult) {
        self.last_export = Some(match result {
            Ok(ExportOutput::Saved { location }) => {
                info!(file = %file_name, "export saved");
                ExportStatus::Saved {
                    file_name,
                    location,
                }
            }
            Ok(ExportOutput::Cancelled) => {
                debug!(file = %file_name, "export cancelled");
                ExportStatus::Cancelled { file_name }
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "export save failed");
                let message = e.to_string();
                self.set_error(e.into());
                ExportStatus::Failed { file_name, message }
            }
        });
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    /// Fatal errors stay until the condition behind them is fixed.
    pub fn clear_error(&mut self) -> bool {
        if self.has_fatal_error() {
            return false;
        }
        self.active_error.take().is_some()
    }

    #[must_use]
    pub fn has_fatal_error(&self) -> bool {
        self.active_error
            .as_ref()
            .is_some_and(|e| e.severity == ErrorSeverity::Fatal)
    }
}

fn log_warnings(warnings: &[ResultWarning]) {
    for warning in warnings {
        match warning {
            ResultWarning::UnknownClassesExcluded { count } => {
                warn!(count, "unknown classes excluded from breakdown");
            }
            other => debug!(?other, "result warning"),
        }
    }
}
