//! End-to-end: image file → hand detections → overlay file.
//!
//! Needs `HANDDET_TEST_MODEL` (ONNX export) and `HANDDET_TEST_IMAGE`
//! (a photo with at least one hand). Skipped when either is missing.

use std::path::PathBuf;

use handdet_pipeline::{save_overlay, HandPipeline, PipelineConfig};

fn env_path(var: &str) -> Option<PathBuf> {
    let path = PathBuf::from(std::env::var_os(var)?);
    if path.exists() {
        Some(path)
    } else {
        eprintln!("Skipping: {var} points at missing {}", path.display());
        None
    }
}

#[test]
fn detects_hands_in_test_image() {
    let (Some(model), Some(image_path)) = (env_path("HANDDET_TEST_MODEL"), env_path("HANDDET_TEST_IMAGE")) else {
        eprintln!("Skipping: HANDDET_TEST_MODEL / HANDDET_TEST_IMAGE not set");
        return;
    };

    let config = PipelineConfig {
        model_path: model.to_string_lossy().into_owned(),
        ..PipelineConfig::default()
    };
    let pipeline = HandPipeline::build(config).expect("failed to build pipeline");
    pipeline.warmup().expect("warmup failed");

    let image = pipeline.open(&image_path).expect("failed to read test image");
    let result = pipeline.process_image(&image).expect("detection failed");

    eprintln!(
        "  {} hand(s) in {:.1}ms (preprocess {:.1}ms)",
        result.num_hands(),
        result.timing.total_ms,
        result.timing.preprocess_ms
    );
    assert!(result.num_hands() >= 1, "expected a hand in {}", image_path.display());

    for [x1, y1, x2, y2] in result.boxes_xyxy() {
        assert!(x1 >= 0.0 && y1 >= 0.0);
        assert!(x2 <= image.width as f32 && y2 <= image.height as f32);
        assert!(x2 > x1 && y2 > y1);
    }
    for conf in result.confidences() {
        assert!(conf >= 0.4);
    }

    let out = tempfile::tempdir().unwrap();
    let overlay = out.path().join("overlay.png");
    save_overlay(&image, &result.detections, &overlay).expect("failed to write overlay");
    assert!(overlay.is_file());
}
