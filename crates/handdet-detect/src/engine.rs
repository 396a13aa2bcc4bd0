use std::path::Path;
use std::time::Instant;

use handdet_core::{DetError, Detection, HandDetector, RawImage, Result};
use handdet_preprocess::Letterbox;
use tract_onnx::prelude::*;

use crate::postprocess::Postprocessor;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// YOLO detector running an exported ONNX model on the CPU.
///
/// The model is expected to take a `[1, 3, size, size]` RGB tensor in
/// `[0, 1]` and produce the raw `[1, 4 + nc, anchors]` head output.
pub struct YoloEngine {
    plan: Plan,
    letterbox: Letterbox,
    postprocess: Postprocessor,
    input_size: u32,
}

impl YoloEngine {
    /// Load and optimize an ONNX model for a fixed square input size.
    pub fn load(model_path: &Path, input_size: u32, postprocess: Postprocessor) -> Result<Self> {
        match model_path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => {
                return Err(DetError::ModelLoad(format!(
                    "model path must have an `.onnx` extension: {}",
                    model_path.display()
                )))
            }
        }
        if !model_path.is_file() {
            return Err(DetError::ModelLoad(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }

        let size = input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| DetError::ModelLoad(format!("{}: {e}", model_path.display())))?;

        tracing::info!(
            model = %model_path.display(),
            input_size,
            conf_threshold = postprocess.conf_threshold(),
            "loaded detection model"
        );

        Ok(Self {
            plan,
            letterbox: Letterbox::new(input_size),
            postprocess,
            input_size,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Run the model on an already letterboxed CHW tensor.
    fn infer(&self, tensor: &[f32]) -> Result<(Vec<f32>, Vec<usize>)> {
        let size = self.input_size as usize;
        let input = Tensor::from_shape(&[1, 3, size, size], tensor)
            .map_err(|e| DetError::Inference(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| DetError::Inference(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| DetError::Inference("model produced no outputs".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| DetError::Inference(e.to_string()))?;

        Ok((view.iter().copied().collect(), view.shape().to_vec()))
    }
}

impl HandDetector for YoloEngine {
    fn name(&self) -> &str {
        "yolo-onnx"
    }

    fn detect(&self, image: &RawImage) -> Result<Vec<Detection>> {
        self.detect_timed(image).map(|(detections, _)| detections)
    }

    fn detect_timed(&self, image: &RawImage) -> Result<(Vec<Detection>, f32)> {
        let start = Instant::now();
        let boxed = self.letterbox.apply(image)?;
        let preprocess_ms = start.elapsed().as_secs_f32() * 1000.0;

        let (data, shape) = self.infer(&boxed.tensor)?;
        let detections = self
            .postprocess
            .decode(&data, &shape)?
            .into_iter()
            .map(|d| Detection {
                bbox: boxed.unmap(&d.bbox),
                ..d
            })
            .collect();
        Ok((detections, preprocess_ms))
    }
}
