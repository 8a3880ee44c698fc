use serde::{Deserialize, Serialize};

use crate::detection::FrameResult;

/// Height floor so empty frames stay visible as a thin bar.
pub const MIN_VISIBLE_HEIGHT_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineBar {
    pub index: usize,
    pub count: usize,
    pub height_pct: f64,
}

#[must_use]
pub fn normalize(counts: &[usize]) -> Vec<f64> {
    normalize_with_floor(counts, MIN_VISIBLE_HEIGHT_PCT)
}

/// Bar heights relative to the busiest frame, in percent. When every count
/// is zero all bars sit at `floor`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalize_with_floor(counts: &[usize], floor: f64) -> Vec<f64> {
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return vec![floor; counts.len()];
    }

    let max = max as f64;
    counts
        .iter()
        .map(|&count| (count as f64 / max * 100.0).max(floor))
        .collect()
}

#[must_use]
pub fn bars(frames: &[FrameResult], floor: f64) -> Vec<TimelineBar> {
    let counts: Vec<usize> = frames.iter().map(|f| f.detection_count).collect();
    normalize_with_floor(&counts, floor)
        .into_iter()
        .zip(counts)
        .enumerate()
        .map(|(index, (height_pct, count))| TimelineBar {
            index,
            count,
            height_pct,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn busiest_frame_is_full_height() {
        assert_eq!(normalize(&[0, 4, 2]), vec![5.0, 100.0, 50.0]);
    }

    #[test]
    fn all_empty_frames_sit_at_floor() {
        assert_eq!(normalize(&[0, 0, 0]), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn empty_sequence_yields_no_bars() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn small_counts_are_lifted_to_floor() {
        assert_eq!(normalize(&[1, 100]), vec![5.0, 100.0]);
        assert_eq!(normalize_with_floor(&[1, 100], 0.0), vec![1.0, 100.0]);
    }

    #[test]
    fn bars_keep_frame_order() {
        use crate::detection::{FrameResult, ImageRef};

        let frame = |index, detection_count| FrameResult {
            index,
            timestamp: String::new(),
            detections: Vec::new(),
            detection_count,
            frame_image: ImageRef::default(),
            original_frame: ImageRef::default(),
        };
        let out = bars(&[frame(0, 2), frame(1, 0), frame(2, 4)], MIN_VISIBLE_HEIGHT_PCT);
        let heights: Vec<f64> = out.iter().map(|b| b.height_pct).collect();
        assert_eq!(heights, vec![50.0, 5.0, 100.0]);
        assert_eq!(out[2].count, 4);
        assert_eq!(out[1].index, 1);
    }

    proptest! {
        #[test]
        fn normalized_heights_hold_invariants(counts in prop::collection::vec(0usize..500, 0..60)) {
            let heights = normalize(&counts);
            prop_assert_eq!(heights.len(), counts.len());

            for h in &heights {
                prop_assert!(*h >= MIN_VISIBLE_HEIGHT_PCT);
                prop_assert!(*h <= 100.0);
            }

            let max = counts.iter().copied().max().unwrap_or(0);
            if max == 0 {
                prop_assert!(heights.iter().all(|h| *h == MIN_VISIBLE_HEIGHT_PCT));
            } else {
                for (count, h) in counts.iter().zip(&heights) {
                    if *count == max {
                        prop_assert_eq!(*h, 100.0);
                    }
                }
            }
        }
    }
}
