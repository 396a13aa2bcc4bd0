use serde::{Deserialize, Serialize};

/// Runtime configuration for the detection pipeline.
///
/// The model is an ONNX export of the trained detector, e.g.
/// `yolo export model=last.pt format=onnx imgsz=640`. `input_size` must
/// match the size used at export time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the ONNX model file.
    pub model_path: String,
    /// Square model input size in pixels.
    pub input_size: u32,
    /// Minimum class confidence for a detection to be reported.
    pub conf_threshold: f32,
    /// IoU above which same-class detections are merged by NMS.
    pub iou_threshold: f32,
    /// Upper bound on detections per image.
    pub max_detections: usize,
    /// Class names, indexed by class id.
    pub class_names: Vec<String>,
    /// Uploaded or loaded images above this pixel count are rejected.
    pub max_image_pixels: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: "models/hand_detect.onnx".to_string(),
            input_size: 640,
            conf_threshold: 0.4,
            iou_threshold: 0.45,
            max_detections: 100,
            class_names: vec!["hand".to_string()],
            max_image_pixels: 64 * 1024 * 1024,
        }
    }
}

impl PipelineConfig {
    /// Smaller input for CPU-bound live camera use. Needs a model exported
    /// at `imgsz=320`.
    pub fn low_latency() -> Self {
        Self {
            model_path: "models/hand_detect_320.onnx".to_string(),
            input_size: 320,
            max_detections: 10,
            ..Self::default()
        }
    }

    pub fn class_name(&self, class_id: u32) -> &str {
        self.class_names
            .get(class_id as usize)
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}
