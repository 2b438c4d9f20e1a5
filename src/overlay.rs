//! Status-coloured box outlines over a frame. No text is drawn.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use crate::frame::Frame;
use crate::geometry::BoundingBox;
use crate::result::ResultSet;
use crate::scoring::Status;
use crate::verdict::Placement;

const LINE_WIDTH: u32 = 3;

const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
const YELLOW: Rgb<u8> = Rgb([230, 200, 0]);
const RED: Rgb<u8> = Rgb([220, 0, 0]);
const GREY: Rgb<u8> = Rgb([128, 128, 128]);
const BLUE: Rgb<u8> = Rgb([0, 90, 255]);

pub fn status_colour(status: Status) -> Rgb<u8> {
    match status {
        Status::Present => GREEN,
        Status::Uncertain => YELLOW,
        Status::Missing => RED,
        Status::Error => GREY,
    }
}

/// Copy of `frame` with one outline per verdict. Positions where a misplaced
/// item was found get a second, inner blue outline.
pub fn render_overlay(frame: &Frame, result: &ResultSet) -> RgbImage {
    let mut canvas = frame.image().clone();
    for verdict in result.verdicts() {
        draw_outline(&mut canvas, &verdict.bbox, status_colour(verdict.status), 0);
    }
    for m in result.misplacements().unwrap_or(&[]) {
        if m.actual_status != Placement::Misplaced {
            continue;
        }
        let target = m.found_at_position_id.as_deref().and_then(|id| {
            result
                .verdicts()
                .iter()
                .find(|v| v.subject.position_id() == Some(id))
        });
        if let Some(target) = target {
            draw_outline(&mut canvas, &target.bbox, BLUE, LINE_WIDTH);
        }
    }
    canvas
}

/// Render and save as PNG.
pub fn save_overlay(frame: &Frame, result: &ResultSet, path: &Path) -> Result<()> {
    render_overlay(frame, result)
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("write overlay {}", path.display()))?;
    log::debug!("overlay written: {}", path.display());
    Ok(())
}

/// Outline `bbox` with a `LINE_WIDTH` border starting `inset` pixels inside it.
/// Parts outside the canvas are skipped.
fn draw_outline(canvas: &mut RgbImage, bbox: &BoundingBox, colour: Rgb<u8>, inset: u32) {
    let Some(b) = bbox.clip_to(canvas.width(), canvas.height()) else {
        return;
    };
    if b.width <= 2 * inset || b.height <= 2 * inset {
        return;
    }
    let (x0, y0) = (b.x + inset, b.y + inset);
    let (x1, y1) = (b.x + b.width - inset, b.y + b.height - inset);
    for y in y0..y1 {
        for x in x0..x1 {
            let edge = x < x0 + LINE_WIDTH
                || x + LINE_WIDTH >= x1
                || y < y0 + LINE_WIDTH
                || y + LINE_WIDTH >= y1;
            if edge {
                canvas.put_pixel(x, y, colour);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{PassOutcome, PassOutput};
    use crate::verdict::{DetectionVerdict, MisplacementVerdict, VerdictSubject};
    use std::time::{Duration, SystemTime};

    fn verdict(id: &str, status: Status, bbox: BoundingBox) -> DetectionVerdict {
        DetectionVerdict {
            subject: VerdictSubject::Position(id.to_string()),
            item_class: "hammer".to_string(),
            status,
            contrast: 0.0,
            bbox,
            best_label: None,
            identified_class: None,
            identified_score: None,
            error: None,
        }
    }

    fn result(output: PassOutput) -> ResultSet {
        ResultSet {
            pass_id: 1,
            frame_sequence: 1,
            started_at: SystemTime::now(),
            finished_at: SystemTime::now(),
            elapsed: Duration::ZERO,
            outcome: PassOutcome::Completed(output),
        }
    }

    #[test]
    fn outlines_follow_status_and_leave_interior() {
        let frame = Frame::new(RgbImage::new(100, 50), 1);
        let output = PassOutput {
            verdicts: vec![
                verdict("tool_1", Status::Present, BoundingBox::new(0, 0, 40, 40)),
                verdict("tool_2", Status::Missing, BoundingBox::new(50, 0, 40, 40)),
            ],
            misplacements: None,
        };
        let canvas = render_overlay(&frame, &result(output));
        assert_eq!(*canvas.get_pixel(0, 0), GREEN);
        assert_eq!(*canvas.get_pixel(39, 20), GREEN);
        assert_eq!(*canvas.get_pixel(20, 20), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(50, 10), RED);
    }

    #[test]
    fn misplaced_target_gets_inner_blue_outline() {
        let frame = Frame::new(RgbImage::new(100, 50), 1);
        let output = PassOutput {
            verdicts: vec![
                verdict("tool_1", Status::Missing, BoundingBox::new(0, 0, 40, 40)),
                verdict("tool_2", Status::Uncertain, BoundingBox::new(50, 0, 40, 40)),
            ],
            misplacements: Some(vec![MisplacementVerdict {
                expected_position_id: "tool_1".to_string(),
                item_class: "hammer".to_string(),
                actual_status: Placement::Misplaced,
                found_at_position_id: Some("tool_2".to_string()),
                bbox: BoundingBox::new(0, 0, 40, 40),
            }]),
        };
        let canvas = render_overlay(&frame, &result(output));
        assert_eq!(*canvas.get_pixel(50, 20), YELLOW);
        assert_eq!(*canvas.get_pixel(53, 20), BLUE);
    }

    #[test]
    fn overlay_saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let frame = Frame::new(RgbImage::new(10, 10), 1);
        save_overlay(&frame, &result(PassOutput::default()), &path).unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 10);
    }
}
