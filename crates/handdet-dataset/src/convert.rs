use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use handdet_core::Result;
use serde::{Deserialize, Serialize};

use crate::categories::CategoryMap;
use crate::coco::CocoDataset;
use crate::yolo::{label_file_name, YoloLabel};

/// Options for a COCO → YOLO conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Class names to keep, in YOLO id order. `None` keeps every category.
    pub target_classes: Option<Vec<String>>,
    /// Also write empty label files for images without any kept annotation.
    pub write_empty: bool,
}

/// Summary of one conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionReport {
    pub annotations_total: usize,
    pub labels_written: usize,
    pub files_written: usize,
    pub skipped_category: usize,
    pub skipped_missing_image: usize,
    pub skipped_invalid: usize,
    pub class_names: Vec<String>,
}

impl ConversionReport {
    pub fn skipped(&self) -> usize {
        self.skipped_category + self.skipped_missing_image + self.skipped_invalid
    }
}

/// Converted labels grouped by label file name.
///
/// Lines keep the order of their annotations in the source file.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    files: BTreeMap<String, Vec<YoloLabel>>,
}

impl LabelSet {
    pub fn get(&self, label_file: &str) -> Option<&[YoloLabel]> {
        self.files.get(label_file).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[YoloLabel])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn label_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Write one file per entry into `dir`, replacing existing files.
    pub fn write_to(&self, dir: &Path) -> Result<usize> {
        std::fs::create_dir_all(dir)?;
        for (name, labels) in &self.files {
            let mut body = String::with_capacity(labels.len() * 48);
            for label in labels {
                // Writing to a String cannot fail.
                let _ = writeln!(body, "{label}");
            }
            std::fs::write(dir.join(name), body)?;
        }
        Ok(self.files.len())
    }
}

/// Convert an in-memory COCO dataset. Never fails: bad annotations are
/// logged, counted and skipped.
pub fn convert_dataset(dataset: &CocoDataset, options: &ConvertOptions) -> (LabelSet, ConversionReport) {
    let categories = CategoryMap::build(&dataset.categories, options.target_classes.as_deref());
    let images = dataset.image_lookup();

    let mut labels = LabelSet::default();
    let mut report = ConversionReport {
        annotations_total: dataset.annotations.len(),
        class_names: categories.names().to_vec(),
        ..Default::default()
    };

    if options.write_empty {
        for img in &dataset.images {
            if let Some(name) = label_file_name(&img.file_name) {
                labels.files.entry(name).or_default();
            }
        }
    }

    for ann in &dataset.annotations {
        let Some(class_id) = categories.yolo_id(ann.category_id) else {
            if dataset.has_category(ann.category_id) {
                tracing::debug!(
                    annotation = ann.id,
                    category_id = ann.category_id,
                    "category not in target classes, skipping"
                );
            } else {
                tracing::warn!(
                    annotation = ann.id,
                    category_id = ann.category_id,
                    "annotation with unexpected category_id, skipping"
                );
            }
            report.skipped_category += 1;
            continue;
        };

        let Some(img) = images.get(&ann.image_id) else {
            tracing::warn!(
                annotation = ann.id,
                image_id = ann.image_id,
                "no image info found for annotation, skipping"
            );
            report.skipped_missing_image += 1;
            continue;
        };

        let Some(label_file) = label_file_name(&img.file_name) else {
            tracing::warn!(
                image_id = img.id,
                file_name = %img.file_name,
                "image has no usable file name, skipping"
            );
            report.skipped_invalid += 1;
            continue;
        };

        match YoloLabel::from_coco_bbox(class_id, &ann.bbox, img.width, img.height) {
            Ok(label) => {
                labels.files.entry(label_file).or_default().push(label);
                report.labels_written += 1;
            }
            Err(e) => {
                tracing::warn!(annotation = ann.id, image_id = ann.image_id, error = %e, "skipping annotation");
                report.skipped_invalid += 1;
            }
        }
    }

    report.files_written = labels.len();
    (labels, report)
}

/// Convert a COCO annotation file into YOLO label files under `labels_output_dir`.
pub fn convert_coco_to_yolo(
    coco_json_path: &Path,
    labels_output_dir: &Path,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let start = Instant::now();
    std::fs::create_dir_all(labels_output_dir)?;

    let dataset = CocoDataset::from_file(coco_json_path)?;
    let (labels, report) = convert_dataset(&dataset, options);
    labels.write_to(labels_output_dir)?;

    tracing::info!(
        source = %coco_json_path.display(),
        output = %labels_output_dir.display(),
        annotations = report.annotations_total,
        labels = report.labels_written,
        files = report.files_written,
        skipped = report.skipped(),
        elapsed_ms = start.elapsed().as_secs_f32() * 1000.0,
        "conversion complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> CocoDataset {
        CocoDataset::from_json(
            r#"{
            "images": [
                {"id": 1, "file_name": "train/a.jpg", "width": 100, "height": 100},
                {"id": 2, "file_name": "b.jpg", "width": 200, "height": 100},
                {"id": 3, "file_name": "c.jpg", "width": 50, "height": 50},
                {"id": 4, "file_name": "zero.jpg", "width": 0, "height": 0}
            ],
            "annotations": [
                {"id": 10, "image_id": 1, "category_id": 5, "bbox": [0, 0, 50, 50]},
                {"id": 11, "image_id": 1, "category_id": 5, "bbox": [50, 50, 50, 50]},
                {"id": 12, "image_id": 2, "category_id": 6, "bbox": [0, 0, 10, 10]},
                {"id": 13, "image_id": 99, "category_id": 5, "bbox": [0, 0, 10, 10]},
                {"id": 14, "image_id": 2, "category_id": 42, "bbox": [0, 0, 10, 10]},
                {"id": 15, "image_id": 4, "category_id": 5, "bbox": [0, 0, 10, 10]},
                {"id": 16, "image_id": 2, "category_id": 5, "bbox": [0, 0, 10]}
            ],
            "categories": [
                {"id": 5, "name": "hand"},
                {"id": 6, "name": "person"}
            ]
        }"#,
        )
        .unwrap()
    }

    fn targets(names: &[&str]) -> ConvertOptions {
        ConvertOptions {
            target_classes: Some(names.iter().map(|s| s.to_string()).collect()),
            write_empty: false,
        }
    }

    #[test]
    fn test_aggregates_per_image() {
        let (labels, report) = convert_dataset(&dataset(), &targets(&["hand"]));
        let a = labels.get("a.txt").unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].to_line(), "0 0.250000 0.250000 0.500000 0.500000");
        assert_eq!(a[1].to_line(), "0 0.750000 0.750000 0.500000 0.500000");
        assert_eq!(report.labels_written, 2);
        assert_eq!(report.files_written, 1);
    }

    #[test]
    fn test_missing_image_is_skipped() {
        let (labels, report) = convert_dataset(&dataset(), &targets(&["hand"]));
        assert_eq!(report.skipped_missing_image, 1);
        assert_eq!(labels.label_count(), 2);
    }

    #[test]
    fn test_untargeted_category_is_skipped() {
        let (labels, report) = convert_dataset(&dataset(), &targets(&["hand"]));
        assert!(labels.get("b.txt").is_none());
        // person (12) and unknown 42 (14)
        assert_eq!(report.skipped_category, 2);
        // zero-size image (15) and short bbox (16)
        assert_eq!(report.skipped_invalid, 2);
        assert_eq!(report.skipped(), 5);
    }

    #[test]
    fn test_all_categories_without_targets() {
        let (labels, report) = convert_dataset(&dataset(), &ConvertOptions::default());
        let b = labels.get("b.txt").unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].class_id, 1);
        assert_eq!(report.class_names, vec!["hand", "person"]);
        assert_eq!(report.skipped_category, 1);
    }

    #[test]
    fn test_write_empty_covers_all_images() {
        let options = ConvertOptions {
            write_empty: true,
            ..targets(&["hand"])
        };
        let (labels, _) = convert_dataset(&dataset(), &options);
        assert_eq!(labels.get("c.txt"), Some(&[][..]));
        assert_eq!(labels.len(), 4);
    }
}
