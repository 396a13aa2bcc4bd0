use std::path::{Path, PathBuf};

use handdet_core::{DetError, RawImage, Result};

/// Extensions picked up when a directory of images is processed.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Decodes encoded image bytes (JPEG, PNG, BMP, TIFF, WebP) to RGB8.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    /// Reject images larger than this many pixels.
    max_pixels: u64,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self {
            max_pixels: 64 * 1024 * 1024,
        }
    }
}

impl ImageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Decode image bytes into an RGB8 buffer.
    pub fn decode(&self, data: &[u8]) -> Result<RawImage> {
        if data.is_empty() {
            return Err(DetError::ImageDecode("empty image buffer".into()));
        }

        let img = image::load_from_memory(data).map_err(|e| DetError::ImageDecode(e.to_string()))?;

        let pixels = img.width() as u64 * img.height() as u64;
        if pixels == 0 || pixels > self.max_pixels {
            return Err(DetError::ImageDecode(format!(
                "unsupported image size {}x{}",
                img.width(),
                img.height()
            )));
        }

        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        tracing::trace!(width, height, bytes = data.len(), "decoded image");

        Ok(RawImage::rgb(rgb.into_raw(), width, height))
    }

    /// Read and decode an image file.
    pub fn open(&self, path: &Path) -> Result<RawImage> {
        let data = std::fs::read(path)?;
        self.decode(&data)
            .map_err(|e| DetError::ImageDecode(format!("{}: {e}", path.display())))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
