use serde::{Deserialize, Serialize};

use crate::capabilities::SaveResult;
use crate::config::ViewerConfig;
use crate::detection::{Detection, ImageDetectionResult, VideoDetectionResult};
use crate::model::AnalysisMode;

// --- Event enum: large payloads boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Configuration
    Configure(Box<ViewerConfig>),
    ConfigureFromJson {
        json: String,
    },
    FontLoaded {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },

    // Analysis lifecycle
    ModeSelected(AnalysisMode),
    AnalysisStarted,
    ImageAnalysisCompleted(Box<ImageDetectionResult>),
    VideoAnalysisCompleted(Box<VideoDetectionResult>),
    AnalysisFailed {
        message: String,
    },

    // Surface
    DisplayImageLoaded {
        width: u32,
        height: u32,
    },
    ViewportResized {
        width: f64,
    },

    // Selection
    DetectionSelected(Box<Detection>),
    DetectionSelectedAt {
        x: f64,
        y: f64,
    },
    SelectionCleared,

    // Frame navigation
    FrameSelected {
        index: usize,
    },
    NextFrame,
    PreviousFrame,
    OverlayToggled {
        enabled: bool,
    },

    // Export
    ExportRequested {
        #[serde(with = "serde_bytes")]
        base_image: Vec<u8>,
    },
    ExportFinished {
        file_name: String,
        result: SaveResult,
    },

    ErrorDismissed,
    Reset,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::ConfigureFromJson { .. } => "configure_from_json",
            Self::FontLoaded { .. } => "font_loaded",
            Self::ModeSelected(_) => "mode_selected",
            Self::AnalysisStarted => "analysis_started",
            Self::ImageAnalysisCompleted(_) => "image_analysis_completed",
            Self::VideoAnalysisCompleted(_) => "video_analysis_completed",
            Self::AnalysisFailed { .. } => "analysis_failed",
            Self::DisplayImageLoaded { .. } => "display_image_loaded",
            Self::ViewportResized { .. } => "viewport_resized",
            Self::DetectionSelected(_) => "detection_selected",
            Self::DetectionSelectedAt { .. } => "detection_selected_at",
            Self::SelectionCleared => "selection_cleared",
            Self::FrameSelected { .. } => "frame_selected",
            Self::NextFrame => "next_frame",
            Self::PreviousFrame => "previous_frame",
            Self::OverlayToggled { .. } => "overlay_toggled",
            Self::ExportRequested { .. } => "export_requested",
            Self::ExportFinished { .. } => "export_finished",
            Self::ErrorDismissed => "error_dismissed",
            Self::Reset => "reset",
        }
    }

    /// Events that come straight from a user gesture rather than from the
    /// host or a capability response.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::ModeSelected(_)
                | Self::DetectionSelected(_)
                | Self::DetectionSelectedAt { .. }
                | Self::SelectionCleared
                | Self::FrameSelected { .. }
                | Self::NextFrame
                | Self::PreviousFrame
                | Self::OverlayToggled { .. }
                | Self::ExportRequested { .. }
                | Self::ErrorDismissed
                | Self::Reset
        )
    }
}
