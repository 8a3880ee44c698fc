use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detection::{Detection, VideoDetectionResult};
use crate::palette::KnownClass;

/// Per-class tallies over the recognized classes. Detections of any other
/// class are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBreakdown {
    counts: [usize; 3],
}

impl ClassBreakdown {
    #[must_use]
    pub fn get(&self, class: KnownClass) -> usize {
        self.counts[class.index()]
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (KnownClass, usize)> + '_ {
        KnownClass::ALL
            .into_iter()
            .map(|class| (class, self.get(class)))
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        self.iter()
            .map(|(class, count)| (class.name().to_string(), count))
            .collect()
    }

    fn record(&mut self, class: KnownClass) {
        self.counts[class.index()] += 1;
    }
}

#[must_use]
pub fn aggregate(detections: &[Detection]) -> ClassBreakdown {
    let mut breakdown = ClassBreakdown::default();
    for class in detections.iter().filter_map(Detection::known_class) {
        breakdown.record(class);
    }
    breakdown
}

/// Detections that `aggregate` leaves out.
#[must_use]
pub fn excluded_count(detections: &[Detection]) -> usize {
    detections
        .iter()
        .filter(|d| d.known_class().is_none())
        .count()
}

/// `count / total * 100`, or 0 when `total` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// One row of the video class distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    pub class_name: String,
    pub count: usize,
    pub percentage: f64,
}

/// Shares of `class_statistics` against `total_detections`, known classes
/// first in display order, then any other class alphabetically.
#[must_use]
pub fn class_distribution(result: &VideoDetectionResult) -> Vec<ClassShare> {
    let share = |class_name: &str, count: usize| ClassShare {
        class_name: class_name.to_string(),
        count,
        percentage: percentage(count, result.total_detections),
    };

    let known = KnownClass::ALL.into_iter().map(|class| {
        let count = result
            .class_statistics
            .get(class.name())
            .copied()
            .unwrap_or(0);
        share(class.name(), count)
    });

    let others = result
        .class_statistics
        .iter()
        .filter(|(name, _)| KnownClass::from_name(name).is_none())
        .map(|(name, &count)| share(name, count));

    known.chain(others).collect()
}

/// Header numbers for a single-image result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub total: usize,
    pub breakdown: ClassBreakdown,
    pub excluded: usize,
}

impl ImageSummary {
    #[must_use]
    pub fn new(detections: &[Detection]) -> Self {
        Self {
            total: detections.len(),
            breakdown: aggregate(detections),
            excluded: excluded_count(detections),
        }
    }
}

/// Header numbers for a video result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub frames: usize,
    pub total_detections: usize,
    pub average_per_frame: f64,
    pub distribution: Vec<ClassShare>,
}

impl VideoSummary {
    #[must_use]
    pub fn new(result: &VideoDetectionResult) -> Self {
        Self {
            frames: result.total_frames_processed,
            total_detections: result.total_detections,
            average_per_frame: result.average_detections_per_frame,
            distribution: class_distribution(result),
        }
    }
}
