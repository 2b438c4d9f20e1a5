//! Frames and region extraction.
//!
//! A `Frame` owns its pixels. The scheduler clones an admitted frame so the
//! background pass never observes a buffer the producer is still writing.

use image::{imageops, RgbImage};

use crate::error::{MonitorError, MonitorResult};
use crate::geometry::BoundingBox;

#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    /// Monotonic sequence number assigned by the source.
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Copy out the pixels under `bbox`, clipped to the frame.
    pub fn region(&self, bbox: &BoundingBox) -> MonitorResult<RgbImage> {
        let clipped = bbox.clip_to(self.width(), self.height()).ok_or_else(|| {
            MonitorError::RegionOutOfBounds {
                region: bbox.to_string(),
                width: self.width(),
                height: self.height(),
            }
        })?;
        Ok(
            imageops::crop_imm(&self.image, clipped.x, clipped.y, clipped.width, clipped.height)
                .to_image(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let image = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 0]));
        Frame::new(image, 1)
    }

    #[test]
    fn region_copies_requested_pixels() {
        let frame = gradient(64, 48);
        let region = frame.region(&BoundingBox::new(10, 20, 5, 4)).unwrap();
        assert_eq!(region.dimensions(), (5, 4));
        assert_eq!(region.get_pixel(0, 0).0, [10, 20, 0]);
        assert_eq!(region.get_pixel(4, 3).0, [14, 23, 0]);
    }

    #[test]
    fn region_is_clipped_at_frame_edge() {
        let frame = gradient(64, 48);
        let region = frame.region(&BoundingBox::new(60, 40, 10, 10)).unwrap();
        assert_eq!(region.dimensions(), (4, 8));
    }

    #[test]
    fn region_outside_frame_is_an_error() {
        let frame = gradient(64, 48);
        assert!(matches!(
            frame.region(&BoundingBox::new(100, 0, 10, 10)),
            Err(MonitorError::RegionOutOfBounds { .. })
        ));
    }
}
