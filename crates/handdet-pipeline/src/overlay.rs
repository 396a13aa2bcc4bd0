use std::convert::Infallible;
use std::path::Path;

use embedded_graphics::mono_font::{ascii::FONT_10X20, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::{Baseline, Text};
use handdet_core::{DetError, Detection, RawImage, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;

// Summary band in the top-left corner.
const BAND_LEFT: u32 = 5;
const BAND_TOP: u32 = 5;
const BAND_RIGHT: u32 = 280;
const BAND_BASE_HEIGHT: u32 = 70;
const BAND_ALPHA: f32 = 0.6;

const TEXT_X: i32 = 15;
const COUNT_BASELINE: i32 = 30;
const LINE_BASELINE: i32 = 60;
const LINE_STEP: u32 = 25;

const COUNT_COLOR: Rgb888 = Rgb888::new(0, 255, 0);
const CONF_COLOR: Rgb888 = Rgb888::new(255, 255, 0);
const EMPTY_COLOR: Rgb888 = Rgb888::new(255, 0, 0);

/// Render detections onto a copy of the image.
///
/// Each hand gets a red box. A darkened band in the top-left corner shows
/// the hand count and one confidence line per hand, or "No hands detected".
pub fn draw_detections(image: &RawImage, detections: &[Detection]) -> Result<RgbImage> {
    let mut canvas = RgbImage::from_raw(image.width, image.height, image.data.clone()).ok_or_else(|| {
        DetError::InvalidInput(format!(
            "pixel buffer does not match {}x{} RGB",
            image.width, image.height
        ))
    })?;

    for det in detections {
        let [x1, y1, x2, y2] = det.bbox.clamp_to(image.width, image.height).to_xyxy();
        for inset in 0..BOX_THICKNESS {
            let (x, y) = (x1 as i32 + inset, y1 as i32 + inset);
            let w = (x2 as i32 - inset) - x;
            let h = (y2 as i32 - inset) - y;
            if w < 1 || h < 1 {
                break;
            }
            draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w as u32, h as u32), BOX_COLOR);
        }
    }

    draw_summary_band(&mut canvas, detections);
    Ok(canvas)
}

fn draw_summary_band(canvas: &mut RgbImage, detections: &[Detection]) {
    let (width, height) = canvas.dimensions();
    let band_bottom = BAND_BASE_HEIGHT + LINE_STEP * detections.len() as u32;
    let x_end = BAND_RIGHT.min(width);
    let y_end = band_bottom.min(height);

    for y in BAND_TOP.min(y_end)..y_end {
        for x in BAND_LEFT.min(x_end)..x_end {
            let px = canvas.get_pixel_mut(x, y);
            for c in px.0.iter_mut() {
                *c = (*c as f32 * (1.0 - BAND_ALPHA)).round() as u8;
            }
        }
    }

    let mut target = Canvas(canvas);
    draw_text(&mut target, &format!("Hands: {}", detections.len()), COUNT_BASELINE, COUNT_COLOR);

    if detections.is_empty() {
        draw_text(&mut target, "No hands detected", LINE_BASELINE, EMPTY_COLOR);
        return;
    }
    for (i, det) in detections.iter().enumerate() {
        let y = LINE_BASELINE + (LINE_STEP as usize * i) as i32;
        draw_text(&mut target, &format!("Conf: {:.2}", det.confidence), y, CONF_COLOR);
    }
}

fn draw_text(target: &mut Canvas<'_>, text: &str, baseline_y: i32, color: Rgb888) {
    let style = MonoTextStyle::new(&FONT_10X20, color);
    match Text::with_baseline(text, Point::new(TEXT_X, baseline_y), style, Baseline::Alphabetic).draw(target) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// `DrawTarget` over an RGB buffer; pixels outside the image are dropped.
struct Canvas<'a>(&'a mut RgbImage);

impl Dimensions for Canvas<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = self.0.dimensions();
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.0.dimensions();
        for Pixel(point, color) in pixels {
            if point.x >= 0 && (point.x as u32) < width && point.y >= 0 && (point.y as u32) < height {
                self.0
                    .put_pixel(point.x as u32, point.y as u32, Rgb([color.r(), color.g(), color.b()]));
            }
        }
        Ok(())
    }
}

/// Draw detections and write the result; the format follows the extension.
pub fn save_overlay(image: &RawImage, detections: &[Detection], path: &Path) -> Result<()> {
    let canvas = draw_detections(image, detections)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    canvas
        .save(path)
        .map_err(|e| DetError::InvalidInput(format!("failed to write {}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), hands = detections.len(), "saved overlay");
    Ok(())
}
