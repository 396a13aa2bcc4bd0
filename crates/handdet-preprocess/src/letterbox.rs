use handdet_core::{BBox, DetError, RawImage, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Gray level used for padding, matching the YOLO training pipeline.
pub const PAD_VALUE: u8 = 114;

/// Aspect-preserving resize into a square model input.
///
/// The image is scaled so its longer side equals `target`, then centered on
/// a gray canvas. The result is laid out as CHW `f32` in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    target: u32,
    filter: FilterType,
}

/// A letterboxed tensor plus the transform needed to map boxes back.
#[derive(Debug, Clone)]
pub struct LetterboxOutput {
    /// CHW, RGB, normalized to `[0, 1]`.
    pub tensor: Vec<f32>,
    pub size: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn new(target: u32) -> Self {
        Self {
            target,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn apply(&self, image: &RawImage) -> Result<LetterboxOutput> {
        if image.width == 0 || image.height == 0 || self.target == 0 {
            return Err(DetError::InvalidInput(format!(
                "cannot letterbox {}x{} into {}",
                image.width, image.height, self.target
            )));
        }
        if image.channels != 3 {
            return Err(DetError::InvalidInput(format!(
                "expected RGB input, got {} channels",
                image.channels
            )));
        }

        let src = RgbImage::from_raw(image.width, image.height, image.data.clone())
            .ok_or_else(|| DetError::InvalidInput("image buffer does not match its dimensions".into()))?;

        let t = self.target as f32;
        let scale = (t / image.width as f32).min(t / image.height as f32);
        let new_w = ((image.width as f32 * scale).round() as u32).clamp(1, self.target);
        let new_h = ((image.height as f32 * scale).round() as u32).clamp(1, self.target);
        let pad_x = (self.target - new_w) / 2;
        let pad_y = (self.target - new_h) / 2;

        let resized = imageops::resize(&src, new_w, new_h, self.filter);
        let mut canvas = RgbImage::from_pixel(self.target, self.target, Rgb([PAD_VALUE; 3]));
        imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

        let plane = (self.target * self.target) as usize;
        let mut tensor = vec![0.0f32; 3 * plane];
        for (i, px) in canvas.pixels().enumerate() {
            for c in 0..3 {
                tensor[c * plane + i] = px[c] as f32 / 255.0;
            }
        }

        tracing::trace!(
            src_w = image.width,
            src_h = image.height,
            new_w,
            new_h,
            pad_x,
            pad_y,
            "letterboxed"
        );

        Ok(LetterboxOutput {
            tensor,
            size: self.target,
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        })
    }
}

impl LetterboxOutput {
    /// Map a box from model-input space back to the source image.
    pub fn unmap(&self, bbox: &BBox) -> BBox {
        BBox::new(
            (bbox.x - self.pad_x) / self.scale,
            (bbox.y - self.pad_y) / self.scale,
            bbox.width / self.scale,
            bbox.height / self.scale,
        )
    }

    /// Map a box from the source image into model-input space.
    pub fn map(&self, bbox: &BBox) -> BBox {
        BBox::new(
            bbox.x * self.scale + self.pad_x,
            bbox.y * self.scale + self.pad_y,
            bbox.width * self.scale,
            bbox.height * self.scale,
        )
    }
}
