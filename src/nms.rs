//! Non-max suppression for overlapping sliding-window detections.

use serde::{Deserialize, Serialize};

use crate::geometry::{iou, BoundingBox};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.3;

/// A scored region awaiting deduplication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredDetection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub item_class: String,
    /// Index of the proposal this detection came from.
    pub proposal_index: usize,
}

/// Keep the best detection of every overlapping cluster.
///
/// Detections are visited by score, highest first (ties keep input order), and a
/// detection is dropped when its IoU with any already-kept one exceeds
/// `iou_threshold`. The result is in descending score order.
pub fn suppress(mut detections: Vec<ScoredDetection>, iou_threshold: f32) -> Vec<ScoredDetection> {
    // `sort_by` is stable, so equal scores stay in input order.
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<ScoredDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = kept
            .iter()
            .any(|k| iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
