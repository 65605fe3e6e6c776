use crate::bounding_box::BoundingBox;
use crate::labels::ClassLabel;
use image::{DynamicImage, Rgb};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

const BOX_THICKNESS: i32 = 2;
const TAG_HEIGHT: u32 = 6;
const TAG_WIDTH: u32 = 30;
const FALLBACK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Renders detections onto a copy of the frame. Boxes are drawn with the
/// class color from the labels table; each box carries a small filled tag
/// strip identifying its class by color. Output dimensions equal input
/// dimensions.
pub fn annotate_frame(
    frame: &DynamicImage,
    detections: &[BoundingBox],
    labels: &[ClassLabel],
) -> DynamicImage {
    let mut canvas = frame.to_rgb8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return DynamicImage::ImageRgb8(canvas);
    }

    for detection in detections {
        let color = labels
            .get(detection.class_id)
            .map(|l| Rgb([l.red, l.green, l.blue]))
            .unwrap_or(FALLBACK_COLOR);

        let x1 = (detection.x1.max(0.0) as u32).min(width - 1);
        let y1 = (detection.y1.max(0.0) as u32).min(height - 1);
        let x2 = (detection.x2.max(0.0) as u32).min(width - 1);
        let y2 = (detection.y2.max(0.0) as u32).min(height - 1);
        let box_width = x2.saturating_sub(x1);
        let box_height = y2.saturating_sub(y1);
        if box_width == 0 || box_height == 0 {
            continue;
        }

        for offset in 0..BOX_THICKNESS {
            let inner_width = box_width as i32 - 2 * offset;
            let inner_height = box_height as i32 - 2 * offset;
            if inner_width <= 0 || inner_height <= 0 {
                break;
            }
            let rect = Rect::at(x1 as i32 + offset, y1 as i32 + offset)
                .of_size(inner_width as u32, inner_height as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }

        let tag_y = (y1 as i32 - TAG_HEIGHT as i32).max(0);
        let tag = Rect::at(x1 as i32, tag_y).of_size(TAG_WIDTH.min(box_width), TAG_HEIGHT);
        draw_filled_rect_mut(&mut canvas, tag, color);
    }

    DynamicImage::ImageRgb8(canvas)
}
