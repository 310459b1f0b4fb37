mod font;

use crate::{
    detection::Detection,
    frame::{AnnotatedFrame, Frame},
};
use common::span_debug;
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect,
};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const STRIP_COLOR: Rgb<u8> = Rgb([24, 24, 24]);
const LABEL_PADDING: u32 = 2;

/// Draw detection overlays on a copy of the frame.
///
/// The output always has the frame's dimensions and is pixel-identical to it
/// when `detections` is empty.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> AnnotatedFrame {
    let _s = span_debug!("annotate");

    let mut image = frame.image.clone();
    for detection in detections {
        draw_detection(&mut image, detection);
    }

    AnnotatedFrame {
        sequence: frame.sequence,
        stamp: frame.stamp,
        image,
        labels: detections.iter().map(|d| d.text.clone()).collect(),
    }
}

fn label(detection: &Detection) -> String {
    match detection.confidence {
        Some(c) => format!("{} {:.0}%", detection.text, c * 100.0),
        None => detection.text.clone(),
    }
}

fn draw_detection(image: &mut RgbImage, detection: &Detection) {
    let r = detection.region;
    let x = r.x1.round() as i32;
    let y = r.y1.round() as i32;
    let w = (r.x2.round() as i32 - x).max(1) as u32;
    let h = (r.y2.round() as i32 - y).max(1) as u32;

    draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), BOX_COLOR);
    if w > 2 && h > 2 {
        let inner = Rect::at(x + 1, y + 1).of_size(w - 2, h - 2);
        draw_hollow_rect_mut(image, inner, BOX_COLOR);
    }

    let text = label(detection);
    let strip_w = font::text_width(&text) + 2 * LABEL_PADDING;
    let strip_h = font::text_height() + 2 * LABEL_PADDING;

    // Above the box, or below it when there is no room at the top.
    let strip_y = if y >= strip_h as i32 {
        y - strip_h as i32
    } else {
        y + h as i32
    };

    let strip = Rect::at(x, strip_y).of_size(strip_w, strip_h);
    draw_filled_rect_mut(image, strip, STRIP_COLOR);
    font::draw_text(
        image,
        x + LABEL_PADDING as i32,
        strip_y + LABEL_PADDING as i32,
        &text,
        BOX_COLOR,
    );
}
