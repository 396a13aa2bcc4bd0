use std::path::Path;

use handdet_dataset::{ConvertOptions, DatasetLayout};
use handdet_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};

/// Everything `--config` can set. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub layout: DatasetLayout,
    pub convert: ConvertOptions,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&data)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_optional() {
        let config: AppConfig = serde_json::from_str(
            r#"{"pipeline": {"model_path": "hands.onnx"}, "convert": {"target_classes": ["hand"]}}"#,
        )
        .unwrap();
        assert_eq!(config.pipeline.model_path, "hands.onnx");
        assert_eq!(config.pipeline.input_size, 640);
        assert_eq!(config.layout.train.output, "train");
        assert_eq!(config.convert.target_classes, Some(vec!["hand".to_string()]));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handdet.json");
        std::fs::write(&path, r#"{"layout": {"yaml_name": "hands.yaml"}}"#).unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.layout.yaml_name, "hands.yaml");
        assert!(AppConfig::load(Some(&dir.path().join("absent.json"))).is_err());
        assert_eq!(AppConfig::load(None).unwrap().pipeline.conf_threshold, 0.4);
    }
}
