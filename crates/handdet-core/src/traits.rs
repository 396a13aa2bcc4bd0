use crate::error::Result;
use crate::types::{Detection, RawImage};

/// A hand detector backend.
///
/// Implementations receive a decoded RGB image and return boxes in that
/// image's pixel space. Clamping to the image bounds is left to the caller.
pub trait HandDetector: Send + Sync {
    /// Human-readable name for tracing.
    fn name(&self) -> &str;

    fn detect(&self, image: &RawImage) -> Result<Vec<Detection>>;

    /// Like [`detect`](Self::detect), also returning the milliseconds spent
    /// preparing the model input. Backends without a separate preprocessing
    /// step report 0.
    fn detect_timed(&self, image: &RawImage) -> Result<(Vec<Detection>, f32)> {
        Ok((self.detect(image)?, 0.0))
    }
}
