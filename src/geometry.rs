use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel units, top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `[x, y, width, height]`, the annotation order.
    pub fn to_xywh(&self) -> [u32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Overlap with `other`, or `None` when the boxes do not overlap on either axis.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 as u64 || y1 <= y0 as u64 {
            return None;
        }
        Some(BoundingBox {
            x: x0,
            y: y0,
            width: (x1 - x0 as u64) as u32,
            height: (y1 - y0 as u64) as u32,
        })
    }

    /// Clip to a `width` x `height` frame. `None` when nothing remains.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        self.intersection(&BoundingBox::new(0, 0, width, height))
    }

    /// Back-project a box found on a frame downscaled by `scale` to full resolution.
    ///
    /// Both corners are projected and rounded independently so a box that fits the
    /// downscaled frame never exceeds the full-resolution one.
    pub fn unscale(&self, scale: f64) -> BoundingBox {
        let project = |v: u64| (v as f64 / scale).round() as u32;
        let x0 = project(self.x as u64);
        let y0 = project(self.y as u64);
        let x1 = project(self.right());
        let y1 = project(self.bottom());
        BoundingBox {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Intersection over union. Zero when the boxes do not overlap or both are empty.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let Some(inter) = a.intersection(b) else {
        return 0.0;
    };
    let inter = inter.area() as f64;
    let union = a.area() as f64 + b.area() as f64 - inter;
    if union <= 0.0 {
        return 0.0;
    }
    (inter / union) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_is_symmetric() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(50, 25, 100, 60);
        assert_eq!(iou(&a, &b), iou(&b, &a));
        assert!(iou(&a, &b) > 0.0);
    }

    #[test]
    fn iou_of_box_with_itself_is_one() {
        let a = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(iou(&a, &a), 1.0);
    }

    #[test]
    fn disjoint_and_touching_boxes_have_zero_iou() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let far = BoundingBox::new(100, 100, 10, 10);
        let touching = BoundingBox::new(10, 0, 10, 10);
        assert_eq!(iou(&a, &far), 0.0);
        assert_eq!(iou(&a, &touching), 0.0);
        assert_eq!(iou(&a, &BoundingBox::default()), 0.0);
    }

    #[test]
    fn iou_matches_hand_computed_value() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 0, 10, 10);
        // 50 / (100 + 100 - 50)
        assert!((iou(&a, &b) - (1.0 / 3.0)).abs() < 1e-6);
    }

    #[test]
    fn clip_drops_boxes_outside_frame() {
        let inside = BoundingBox::new(600, 400, 100, 100);
        assert_eq!(
            inside.clip_to(640, 480),
            Some(BoundingBox::new(600, 400, 40, 80))
        );
        assert_eq!(BoundingBox::new(700, 10, 5, 5).clip_to(640, 480), None);
    }

    #[test]
    fn unscale_back_projects_both_corners() {
        let small = BoundingBox::new(50, 100, 100, 100);
        assert_eq!(small.unscale(0.5), BoundingBox::new(100, 200, 200, 200));
        assert_eq!(small.unscale(1.0), small);
    }
}
