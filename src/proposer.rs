//! Candidate regions to classify.
//!
//! Catalog mode yields one proposal per configured position. Sliding-window
//! mode tiles the frame (optionally downscaled first, to bound the proposal
//! count) with fixed-size windows; cells that would cross the frame edge are
//! dropped rather than clipped so every window has the same size.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::WorkspaceCatalog;
use crate::error::{MonitorError, MonitorResult};
use crate::frame::Frame;
use crate::geometry::BoundingBox;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_position_id: Option<String>,
}

/// Sliding-window grid parameters. `window` and `stride` are in downscaled pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SlidingWindow {
    window: u32,
    stride: u32,
    scale: f64,
}

impl SlidingWindow {
    pub fn new(window: u32, stride: u32, scale: f64) -> MonitorResult<Self> {
        if window == 0 || stride == 0 {
            return Err(MonitorError::InvalidConfig(format!(
                "sliding window and stride must be > 0 (window={}, stride={})",
                window, stride
            )));
        }
        if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "sliding window scale must be in (0, 1], got {}",
                scale
            )));
        }
        Ok(Self {
            window,
            stride,
            scale,
        })
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Grid over a `width` x `height` frame, boxes in full-resolution pixels.
    pub fn grid(&self, width: u32, height: u32) -> Vec<BoundingBox> {
        let sw = (width as f64 * self.scale).floor() as u32;
        let sh = (height as f64 * self.scale).floor() as u32;
        let s = self.window;
        if sw <= s || sh <= s {
            return Vec::new();
        }
        let mut boxes = Vec::new();
        for y in (0..sh - s).step_by(self.stride as usize) {
            for x in (0..sw - s).step_by(self.stride as usize) {
                boxes.push(BoundingBox::new(x, y, s, s).unscale(self.scale));
            }
        }
        boxes
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self {
            window: 100,
            stride: 50,
            scale: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ProposalMode {
    Catalog(Arc<WorkspaceCatalog>),
    SlidingWindow(SlidingWindow),
}

/// Proposals for `frame` under `mode`.
pub fn propose(frame: &Frame, mode: &ProposalMode) -> Vec<Proposal> {
    match mode {
        ProposalMode::Catalog(catalog) => catalog
            .positions()
            .iter()
            .map(|p| Proposal {
                bbox: p.bbox,
                source_position_id: Some(p.id.clone()),
            })
            .collect(),
        ProposalMode::SlidingWindow(grid) => grid
            .grid(frame.width(), frame.height())
            .into_iter()
            .map(|bbox| Proposal {
                bbox,
                source_position_id: None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WorkspacePosition;
    use image::RgbImage;

    fn blank(width: u32, height: u32) -> Frame {
        Frame::new(RgbImage::new(width, height), 0)
    }

    #[test]
    fn catalog_mode_is_deterministic_and_keeps_boxes() {
        let catalog = Arc::new(
            WorkspaceCatalog::new(vec![
                WorkspacePosition {
                    id: "tool_1".into(),
                    label: "hammer".into(),
                    bbox: BoundingBox::new(10, 20, 30, 40),
                },
                WorkspacePosition {
                    id: "tool_2".into(),
                    label: "pliers".into(),
                    bbox: BoundingBox::new(100, 20, 30, 40),
                },
            ])
            .unwrap(),
        );
        let mode = ProposalMode::Catalog(catalog);
        let first = propose(&blank(640, 480), &mode);
        let second = propose(&blank(1280, 720), &mode);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].bbox.to_xywh(), [10, 20, 30, 40]);
        assert_eq!(first[0].source_position_id.as_deref(), Some("tool_1"));
    }

    #[test]
    fn sliding_grid_drops_edge_cells() {
        let grid = SlidingWindow::new(200, 100, 1.0).unwrap();
        // x in [0, 440) step 100 -> 0..=400 (5), y in [0, 280) step 100 -> 0..=200 (3)
        let boxes = grid.grid(640, 480);
        assert_eq!(boxes.len(), 15);
        assert!(boxes.iter().all(|b| b.right() <= 640 && b.bottom() <= 480));
        assert!(boxes.iter().all(|b| b.width == 200 && b.height == 200));
        assert_eq!(boxes[0], BoundingBox::new(0, 0, 200, 200));
        assert_eq!(boxes[14], BoundingBox::new(400, 200, 200, 200));
    }

    #[test]
    fn downscaled_grid_is_projected_back() {
        let grid = SlidingWindow::new(100, 50, 0.5).unwrap();
        // 640x480 -> 320x240; x in [0,220) step 50 -> 5, y in [0,140) step 50 -> 3
        let boxes = grid.grid(640, 480);
        assert_eq!(boxes.len(), 15);
        assert_eq!(boxes[1], BoundingBox::new(100, 0, 200, 200));
        assert!(boxes.iter().all(|b| b.right() <= 640 && b.bottom() <= 480));
    }

    #[test]
    fn frame_smaller_than_window_has_no_proposals() {
        let grid = SlidingWindow::new(100, 50, 1.0).unwrap();
        assert!(grid.grid(100, 400).is_empty());
        assert!(propose(&blank(80, 80), &ProposalMode::SlidingWindow(grid)).is_empty());
    }

    #[test]
    fn invalid_grid_parameters_are_rejected() {
        assert!(SlidingWindow::new(0, 10, 1.0).is_err());
        assert!(SlidingWindow::new(10, 0, 1.0).is_err());
        assert!(SlidingWindow::new(10, 10, 0.0).is_err());
        assert!(SlidingWindow::new(10, 10, 1.5).is_err());
        assert!(SlidingWindow::new(10, 10, f64::NAN).is_err());
    }
}
