//! COCO annotation model.
//!
//! Only the fields needed for box conversion are kept. Segmentation,
//! `info` and `licenses` are accepted and dropped by serde.

use std::collections::HashMap;
use std::path::Path;

use handdet_core::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoImage {
    pub id: u64,
    pub file_name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoAnnotation {
    #[serde(default)]
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    /// `[x_min, y_min, width, height]` in pixels.
    pub bbox: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub supercategory: String,
}

impl CocoDataset {
    /// Parse a COCO JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            images = dataset.images.len(),
            annotations = dataset.annotations.len(),
            categories = dataset.categories.len(),
            "loaded COCO annotations"
        );
        Ok(dataset)
    }

    /// Parse COCO JSON from a string.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Image records keyed by id.
    pub fn image_lookup(&self) -> HashMap<u64, &CocoImage> {
        self.images.iter().map(|img| (img.id, img)).collect()
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_category(&self, id: u64) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }
}
