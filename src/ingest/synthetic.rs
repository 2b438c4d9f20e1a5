use image::{Rgb, RgbImage};

use crate::frame::Frame;

/// Grey board with a row of coloured "tools" that rotate every 50 frames.
pub(crate) struct SyntheticBoard {
    width: u32,
    height: u32,
    frame_count: u64,
    scene_state: u8,
}

const TOOL_COLOURS: [Rgb<u8>; 4] = [
    Rgb([200, 40, 40]),
    Rgb([40, 40, 200]),
    Rgb([220, 200, 40]),
    Rgb([40, 160, 60]),
];

impl SyntheticBoard {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count: 0,
            scene_state: 0,
        }
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn next_frame(&mut self) -> Frame {
        self.frame_count += 1;
        if self.frame_count.is_multiple_of(50) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let slots = TOOL_COLOURS.len() as u32;
        let slot_width = (self.width / slots).max(1);
        let shift = self.scene_state as usize;
        let (top, bottom) = (self.height / 4, self.height * 3 / 4);
        let image = RgbImage::from_fn(self.width, self.height, |x, y| {
            let slot = (x / slot_width).min(slots - 1) as usize;
            // leave a gap between slots and an empty border top and bottom
            let inset = x % slot_width > slot_width / 8 && x % slot_width < slot_width * 7 / 8;
            if inset && y >= top && y < bottom {
                TOOL_COLOURS[(slot + shift) % TOOL_COLOURS.len()]
            } else {
                Rgb([96, 96, 96])
            }
        });
        Frame::new(image, self.frame_count)
    }
}
