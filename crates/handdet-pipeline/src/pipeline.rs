use std::path::Path;
use std::time::Instant;

use handdet_core::{HandDetector, HandResult, RawImage, Result, TimingInfo};
use handdet_decode::ImageDecoder;
use handdet_detect::{Postprocessor, YoloEngine};

use crate::config::PipelineConfig;

/// decode → detect → clamp.
pub struct HandPipeline {
    decoder: ImageDecoder,
    detector: Box<dyn HandDetector>,
    config: PipelineConfig,
}

impl HandPipeline {
    /// Build the pipeline with the ONNX engine named in the config.
    pub fn build(config: PipelineConfig) -> Result<Self> {
        tracing::info!(model = %config.model_path, "building detection pipeline");

        let postprocess = Postprocessor::new()
            .with_conf_threshold(config.conf_threshold)
            .with_iou_threshold(config.iou_threshold)
            .with_max_detections(config.max_detections);
        let engine = YoloEngine::load(Path::new(&config.model_path), config.input_size, postprocess)?;

        Ok(Self::with_detector(config, Box::new(engine)))
    }

    /// Build the pipeline around an existing detector backend.
    pub fn with_detector(config: PipelineConfig, detector: Box<dyn HandDetector>) -> Self {
        let decoder = ImageDecoder::new().with_max_pixels(config.max_image_pixels);
        tracing::info!(detector = detector.name(), "detection pipeline ready");
        Self {
            decoder,
            detector,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Decode without detecting.
    pub fn decode(&self, data: &[u8]) -> Result<RawImage> {
        self.decoder.decode(data)
    }

    pub fn open(&self, path: &Path) -> Result<RawImage> {
        self.decoder.open(path)
    }

    /// Decode encoded image bytes and run detection.
    pub fn process_bytes(&self, data: &[u8]) -> Result<HandResult> {
        let decode_start = Instant::now();
        let image = self.decoder.decode(data)?;
        let decode_ms = decode_start.elapsed().as_secs_f32() * 1000.0;

        let mut result = self.process_image(&image)?;
        result.timing.decode_ms = decode_ms;
        result.timing.total_ms += decode_ms;
        Ok(result)
    }

    /// Run detection on a decoded image.
    ///
    /// Boxes are clipped to the image and detections under the configured
    /// confidence threshold are dropped, whatever the backend returned.
    pub fn process_image(&self, image: &RawImage) -> Result<HandResult> {
        let start = Instant::now();
        let mut timing = TimingInfo::default();

        let detect_start = Instant::now();
        let (raw, preprocess_ms) = self.detector.detect_timed(image)?;
        let detect_total = detect_start.elapsed().as_secs_f32() * 1000.0;
        timing.preprocess_ms = preprocess_ms;
        timing.detect_ms = (detect_total - preprocess_ms).max(0.0);

        let detections: Vec<_> = raw
            .into_iter()
            .filter(|d| d.confidence >= self.config.conf_threshold)
            .map(|mut d| {
                d.bbox = d.bbox.clamp_to(image.width, image.height);
                d
            })
            .collect();

        timing.total_ms = start.elapsed().as_secs_f32() * 1000.0;

        tracing::info!(
            width = image.width,
            height = image.height,
            hands = detections.len(),
            preprocess_ms = timing.preprocess_ms,
            detect_ms = timing.detect_ms,
            total_ms = timing.total_ms,
            "detection complete"
        );

        Ok(HandResult {
            width: image.width,
            height: image.height,
            detections,
            timing,
        })
    }

    /// Warm up the detector with a blank frame.
    pub fn warmup(&self) -> Result<()> {
        tracing::info!("warming up detector");
        let size = self.config.input_size.max(1);
        let blank = RawImage::rgb(vec![114; frame_len(size)], size, size);
        self.detector.detect(&blank)?;
        tracing::info!("warmup complete");
        Ok(())
    }
}

/// Byte length of a square RGB frame.
fn frame_len(size: u32) -> usize {
    size as usize * size as usize * 3
}
