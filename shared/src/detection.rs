use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::palette::KnownClass;

// ============================================================================
// Errors
// ============================================================================

/// A result payload that breaks its own invariants. The core does not try to
/// repair these; the payload is rejected as a whole.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PayloadError {
    #[error("analysis reported failure")]
    Unsuccessful,

    #[error("detection {position}{}: {reason}", frame_suffix(.frame))]
    InvalidDetection {
        frame: Option<usize>,
        position: usize,
        reason: &'static str,
    },

    #[error("`{field}` is {declared} but the payload holds {actual}")]
    CountMismatch {
        field: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("average_detections_per_frame is {declared}, expected {expected}")]
    AverageMismatch { declared: f64, expected: f64 },

    #[error("frame at position {position} has index {index}, which is not after the previous frame")]
    FrameOutOfOrder { position: usize, index: usize },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

fn frame_suffix(frame: &Option<usize>) -> String {
    frame.map(|f| format!(" of frame {f}")).unwrap_or_default()
}

const AVERAGE_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Detection
// ============================================================================

/// One classified, localized object. Coordinates are in the detector's
/// native resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// 0.0..=1.0
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` with `x1 <= x2` and `y1 <= y2`
    pub bbox: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
}

impl Detection {
    #[must_use]
    pub fn new(class_name: impl Into<String>, confidence: f64, bbox: [f64; 4]) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
            class_id: None,
        }
    }

    #[must_use]
    pub fn known_class(&self) -> Option<KnownClass> {
        KnownClass::from_name(&self.class_name)
    }

    #[must_use]
    pub fn x1(&self) -> f64 {
        self.bbox[0]
    }

    #[must_use]
    pub fn y1(&self) -> f64 {
        self.bbox[1]
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.bbox[2] - self.bbox[0]
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bbox[3] - self.bbox[1]
    }

    fn check(&self) -> Result<(), &'static str> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err("confidence outside [0, 1]");
        }
        if self.bbox.iter().any(|v| !v.is_finite()) {
            return Err("bbox has a non-finite coordinate");
        }
        let [x1, y1, x2, y2] = self.bbox;
        if x1 > x2 || y1 > y2 {
            return Err("bbox corners are inverted");
        }
        Ok(())
    }
}

fn check_detections(detections: &[Detection], frame: Option<usize>) -> Result<(), PayloadError> {
    for (position, detection) in detections.iter().enumerate() {
        detection
            .check()
            .map_err(|reason| PayloadError::InvalidDetection {
                frame,
                position,
                reason,
            })?;
    }
    Ok(())
}

/// Reference to a displayable image: a URL or a `data:` URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Non-fatal result conditions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultWarning {
    NoDetections,
    NoFrames,
    NoTotalDetections,
    UnknownClassesExcluded { count: usize },
}

impl ResultWarning {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NoDetections => "No objects were detected.".into(),
            Self::NoFrames => "The video produced no frames.".into(),
            Self::NoTotalDetections => "No objects were detected in any frame.".into(),
            Self::UnknownClassesExcluded { count } => format!(
                "{count} detection(s) of an unrecognized class are shown but not counted per class."
            ),
        }
    }
}

// ============================================================================
// Image result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetectionResult {
    pub success: bool,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub total_detections: usize,
    #[serde(default)]
    pub processed_image: ImageRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_size: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_names: Vec<String>,
}

impl ImageDetectionResult {
    /// Successful result whose total matches its detections.
    #[must_use]
    pub fn new(detections: Vec<Detection>, processed_image: ImageRef) -> Self {
        Self {
            success: true,
            total_detections: detections.len(),
            detections,
            processed_image,
            original_image_size: None,
            class_names: Vec::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`PayloadError::Malformed`] if `bytes` is not a result document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(bytes).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns the first broken invariant.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if !self.success {
            return Err(PayloadError::Unsuccessful);
        }
        if self.total_detections != self.detections.len() {
            return Err(PayloadError::CountMismatch {
                field: "total_detections",
                declared: self.total_detections,
                actual: self.detections.len(),
            });
        }
        check_detections(&self.detections, None)
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<ResultWarning> {
        let mut warnings = Vec::new();
        if self.detections.is_empty() {
            warnings.push(ResultWarning::NoDetections);
        }
        let unknown = crate::stats::excluded_count(&self.detections);
        if unknown > 0 {
            warnings.push(ResultWarning::UnknownClassesExcluded { count: unknown });
        }
        warnings
    }
}

// ============================================================================
// Video result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    #[serde(alias = "frame_index")]
    pub index: usize,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub detection_count: usize,
    #[serde(default)]
    pub frame_image: ImageRef,
    #[serde(default)]
    pub original_frame: ImageRef,
}

impl FrameResult {
    #[must_use]
    pub fn new(
        index: usize,
        timestamp: impl Into<String>,
        detections: Vec<Detection>,
        frame_image: ImageRef,
        original_frame: ImageRef,
    ) -> Self {
        Self {
            index,
            timestamp: timestamp.into(),
            detection_count: detections.len(),
            detections,
            frame_image,
            original_frame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetectionResult {
    pub success: bool,
    #[serde(default)]
    pub frame_results: Vec<FrameResult>,
    #[serde(default)]
    pub total_frames_processed: usize,
    #[serde(default)]
    pub total_detections: usize,
    #[serde(default)]
    pub average_detections_per_frame: f64,
    #[serde(default)]
    pub class_statistics: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn average_per_frame(total_detections: usize, frames: usize) -> f64 {
    if frames == 0 {
        0.0
    } else {
        total_detections as f64 / frames as f64
    }
}

impl VideoDetectionResult {
    /// Builds a consistent result from frames, deriving every summary
    /// field. Known classes always appear in `class_statistics`.
    #[must_use]
    pub fn from_frames(frame_results: Vec<FrameResult>) -> Self {
        let mut class_statistics: BTreeMap<String, usize> = KnownClass::ALL
            .iter()
            .map(|class| (class.name().to_string(), 0))
            .collect();

        for detection in frame_results.iter().flat_map(|f| &f.detections) {
            *class_statistics
                .entry(detection.class_name.clone())
                .or_default() += 1;
        }

        let total_detections: usize = frame_results.iter().map(|f| f.detection_count).sum();
        let total_frames_processed = frame_results.len();

        Self {
            success: true,
            average_detections_per_frame: average_per_frame(
                total_detections,
                total_frames_processed,
            ),
            frame_results,
            total_frames_processed,
            total_detections,
            class_statistics,
            video_url: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`PayloadError::Malformed`] if `bytes` is not a result document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(bytes).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&FrameResult> {
        self.frame_results.get(index)
    }

    /// # Errors
    ///
    /// Returns the first broken invariant.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if !self.success {
            return Err(PayloadError::Unsuccessful);
        }

        if self.total_frames_processed != self.frame_results.len() {
            return Err(PayloadError::CountMismatch {
                field: "total_frames_processed",
                declared: self.total_frames_processed,
                actual: self.frame_results.len(),
            });
        }

        let mut previous: Option<usize> = None;
        for (position, frame) in self.frame_results.iter().enumerate() {
            if previous.is_some_and(|prev| frame.index <= prev) {
                return Err(PayloadError::FrameOutOfOrder {
                    position,
                    index: frame.index,
                });
            }
            previous = Some(frame.index);

            if frame.detection_count != frame.detections.len() {
                return Err(PayloadError::CountMismatch {
                    field: "detection_count",
                    declared: frame.detection_count,
                    actual: frame.detections.len(),
                });
            }
            check_detections(&frame.detections, Some(position))?;
        }

        let summed: usize = self.frame_results.iter().map(|f| f.detection_count).sum();
        if self.total_detections != summed {
            return Err(PayloadError::CountMismatch {
                field: "total_detections",
                declared: self.total_detections,
                actual: summed,
            });
        }

        let class_sum: usize = self.class_statistics.values().sum();
        if class_sum != self.total_detections {
            return Err(PayloadError::CountMismatch {
                field: "class_statistics",
                declared: class_sum,
                actual: self.total_detections,
            });
        }

        let expected = average_per_frame(self.total_detections, self.total_frames_processed);
        if !self.average_detections_per_frame.is_finite()
            || (self.average_detections_per_frame - expected).abs() > AVERAGE_TOLERANCE
        {
            return Err(PayloadError::AverageMismatch {
                declared: self.average_detections_per_frame,
                expected,
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<ResultWarning> {
        let mut warnings = Vec::new();
        if self.frame_results.is_empty() {
            warnings.push(ResultWarning::NoFrames);
        } else if self.total_detections == 0 {
            warnings.push(ResultWarning::NoTotalDetections);
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn det(class: &str, bbox: [f64; 4]) -> Detection {
        Detection::new(class, 0.9, bbox)
    }

    fn frame(index: usize, detections: Vec<Detection>) -> FrameResult {
        FrameResult::new(
            index,
            format!("{:.2}s", index as f64 / 30.0),
            detections,
            ImageRef::new(format!("frame-{index}.jpg")),
            ImageRef::new(format!("original-{index}.jpg")),
        )
    }

    fn frames_with_counts(counts: &[usize]) -> Vec<FrameResult> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &n)| frame(i, (0..n).map(|_| det("RBC", [0.0, 0.0, 5.0, 5.0])).collect()))
            .collect()
    }

    #[test]
    fn parses_backend_image_payload() {
        let json = br#"{
            "success": true,
            "detections": [
                {"bbox": [10.0, 10.0, 50.0, 50.0], "confidence": 0.92, "class_id": 2, "class_name": "RBC"}
            ],
            "total_detections": 1,
            "original_image_size": [640, 480],
            "processed_image": "data:image/jpeg;base64,AAAA",
            "class_names": ["Platelets", "RBC", "WBC"],
            "model_info": "ignored"
        }"#;
        let result = ImageDetectionResult::from_json(json).unwrap();
        assert!(result.validate().is_ok());
        assert_eq!(result.detections[0].class_id, Some(2));
        assert_eq!(result.original_image_size, Some([640, 480]));
        assert!(result.processed_image.as_str().starts_with("data:image/jpeg"));
    }

    #[test]
    fn parses_frame_index_alias() {
        let json = br#"{
            "success": true,
            "total_frames_processed": 1,
            "total_detections": 0,
            "class_statistics": {"Platelets": 0, "RBC": 0, "WBC": 0},
            "average_detections_per_frame": 0,
            "frame_results": [
                {"frame_index": 0, "detections": [], "detection_count": 0,
                 "frame_image": "a", "original_frame": "b", "timestamp": "0.00s"}
            ]
        }"#;
        let result = VideoDetectionResult::from_json(json).unwrap();
        assert!(result.validate().is_ok());
        assert_eq!(result.frame_results[0].index, 0);
        assert_eq!(result.frame_results[0].timestamp, "0.00s");
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            ImageDetectionResult::from_json(b"[1,2"),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn image_total_must_match() {
        let mut result = ImageDetectionResult::new(
            vec![det("RBC", [0.0, 0.0, 1.0, 1.0])],
            ImageRef::default(),
        );
        result.total_detections = 2;
        assert_eq!(
            result.validate(),
            Err(PayloadError::CountMismatch {
                field: "total_detections",
                declared: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn inverted_bbox_is_rejected() {
        let result = ImageDetectionResult::new(
            vec![det("RBC", [0.0, 0.0, 1.0, 1.0]), det("WBC", [50.0, 10.0, 40.0, 20.0])],
            ImageRef::default(),
        );
        assert!(matches!(
            result.validate(),
            Err(PayloadError::InvalidDetection { frame: None, position: 1, .. })
        ));
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        let result = ImageDetectionResult::new(
            vec![Detection::new("RBC", 1.5, [0.0, 0.0, 1.0, 1.0])],
            ImageRef::default(),
        );
        assert!(result.validate().is_err());

        let nan = ImageDetectionResult::new(
            vec![Detection::new("RBC", f64::NAN, [0.0, 0.0, 1.0, 1.0])],
            ImageRef::default(),
        );
        assert!(nan.validate().is_err());
    }

    #[test]
    fn unsuccessful_result_is_rejected() {
        let mut result = ImageDetectionResult::new(Vec::new(), ImageRef::default());
        result.success = false;
        assert_eq!(result.validate(), Err(PayloadError::Unsuccessful));
    }

    #[test]
    fn empty_image_warns_but_validates() {
        let result = ImageDetectionResult::new(Vec::new(), ImageRef::default());
        assert!(result.validate().is_ok());
        assert_eq!(result.warnings(), vec![ResultWarning::NoDetections]);
    }

    #[test]
    fn unknown_class_warns() {
        let result = ImageDetectionResult::new(
            vec![det("RBC", [0.0; 4]), det("Unknown", [0.0; 4]), det("WBC", [0.0; 4])],
            ImageRef::default(),
        );
        assert_eq!(
            result.warnings(),
            vec![ResultWarning::UnknownClassesExcluded { count: 1 }]
        );
    }

    #[test]
    fn from_frames_derives_summary() {
        let result = VideoDetectionResult::from_frames(frames_with_counts(&[0, 4, 2]));
        assert_eq!(result.total_frames_processed, 3);
        assert_eq!(result.total_detections, 6);
        assert_eq!(result.average_detections_per_frame, 2.0);
        assert_eq!(result.class_statistics["RBC"], 6);
        assert_eq!(result.class_statistics["WBC"], 0);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn zero_frames_average_is_zero() {
        let result = VideoDetectionResult::from_frames(Vec::new());
        assert_eq!(result.average_detections_per_frame, 0.0);
        assert!(result.validate().is_ok());
        assert_eq!(result.warnings(), vec![ResultWarning::NoFrames]);
    }

    #[test]
    fn all_empty_frames_warn() {
        let result = VideoDetectionResult::from_frames(frames_with_counts(&[0, 0]));
        assert_eq!(result.warnings(), vec![ResultWarning::NoTotalDetections]);
    }

    #[test]
    fn video_invariants_are_checked() {
        let good = VideoDetectionResult::from_frames(frames_with_counts(&[1, 2]));

        let mut frames_off = good.clone();
        frames_off.total_frames_processed = 3;
        assert!(matches!(
            frames_off.validate(),
            Err(PayloadError::CountMismatch { field: "total_frames_processed", .. })
        ));

        let mut total_off = good.clone();
        total_off.total_detections = 4;
        assert!(matches!(
            total_off.validate(),
            Err(PayloadError::CountMismatch { field: "total_detections", .. })
        ));

        let mut stats_off = good.clone();
        stats_off.class_statistics.insert("WBC".into(), 1);
        assert!(matches!(
            stats_off.validate(),
            Err(PayloadError::CountMismatch { field: "class_statistics", .. })
        ));

        let mut average_off = good.clone();
        average_off.average_detections_per_frame = 2.0;
        assert!(matches!(
            average_off.validate(),
            Err(PayloadError::AverageMismatch { .. })
        ));

        let mut count_off = good.clone();
        count_off.frame_results[0].detection_count = 5;
        assert!(matches!(
            count_off.validate(),
            Err(PayloadError::CountMismatch { field: "detection_count", .. })
        ));

        let mut order_off = good;
        order_off.frame_results[1].index = 0;
        assert_eq!(
            order_off.validate(),
            Err(PayloadError::FrameOutOfOrder { position: 1, index: 0 })
        );
    }

    #[test]
    fn frame_detection_errors_name_the_frame() {
        let mut result = VideoDetectionResult::from_frames(frames_with_counts(&[1, 1]));
        result.frame_results[1].detections[0].bbox = [5.0, 0.0, 1.0, 1.0];
        let err = result.validate().unwrap_err();
        assert!(err.to_string().contains("of frame 1"), "{err}");
    }

    proptest! {
        #[test]
        fn from_frames_satisfies_invariants(
            counts in prop::collection::vec(0usize..20, 0..30),
            unknown_every in 1usize..5,
        ) {
            let frames: Vec<FrameResult> = counts
                .iter()
                .enumerate()
                .map(|(i, &n)| {
                    let detections = (0..n)
                        .map(|j| {
                            let class = if j % unknown_every == 0 { "Unknown" } else { "WBC" };
                            det(class, [1.0, 1.0, 2.0, 2.0])
                        })
                        .collect();
                    frame(i, detections)
                })
                .collect();

            let result = VideoDetectionResult::from_frames(frames);
            let class_sum: usize = result.class_statistics.values().sum();
            prop_assert_eq!(class_sum, result.total_detections);
            prop_assert_eq!(result.total_detections, counts.iter().sum::<usize>());
            prop_assert_eq!(
                result.average_detections_per_frame,
                average_per_frame(result.total_detections, result.total_frames_processed)
            );
            prop_assert!(result.validate().is_ok());
        }
    }
}
