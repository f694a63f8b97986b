use growth::{BoundingBox, ProcessedDetection, ProcessedFrame, StageCatalog, StageInfo};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::io::Cursor;

const BOX_THICKNESS: i32 = 2;
const TAB_HEIGHT: u32 = 16;
/// Tab width per character of the caption.
const TAB_CHAR_WIDTH: u32 = 9;

/// Draw every detection of `frame` onto a copy of `image`.
///
/// Each box gets a 2px outline and a filled tab above it, both in the stage
/// color from `catalog`. Degenerate boxes are skipped.
pub fn render_overlay(
    image: &DynamicImage,
    frame: &ProcessedFrame,
    catalog: &StageCatalog,
) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for det in &frame.detections {
        if det.bbox.is_degenerate() {
            tracing::trace!(bbox = ?det.bbox, "Skipping degenerate box");
            continue;
        }

        let info = catalog.info_for(&det.label);
        let color = Rgb(info.color);
        draw_box(&mut canvas, &det.bbox, color);

        let caption = caption(det, &info);
        let width = caption.chars().count() as u32 * TAB_CHAR_WIDTH;
        draw_label_tab(&mut canvas, &det.bbox, width, color);
    }

    canvas
}

/// `"Muda 0.87 | Panen: +2 hari"`
fn caption(det: &ProcessedDetection, info: &StageInfo) -> String {
    format!("{} {:.2} | {}", det.label, det.confidence, info.harvest_hint())
}

fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width() - 2 * inset;
        let height = bbox.height() - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x1 + inset, bbox.y1 + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Tab sits on top of the box, or just inside it when the box touches the
/// top edge of the image.
fn draw_label_tab(canvas: &mut RgbImage, bbox: &BoundingBox, width: u32, color: Rgb<u8>) {
    let top = if bbox.y1 >= TAB_HEIGHT as i32 {
        bbox.y1 - TAB_HEIGHT as i32
    } else {
        bbox.y1
    };
    let rect = Rect::at(bbox.x1, top).of_size(width.max(1), TAB_HEIGHT);
    draw_filled_rect_mut(canvas, rect, color);
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut jpeg_bytes = Cursor::new(Vec::new());
    image.write_to(&mut jpeg_bytes, ImageFormat::Jpeg)?;
    Ok(jpeg_bytes.into_inner())
}
