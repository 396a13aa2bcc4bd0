use std::path::{Path, PathBuf};

use handdet_core::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::convert::{convert_coco_to_yolo, ConversionReport, ConvertOptions};

/// One dataset split: where its COCO sources live and where it goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitLayout {
    /// COCO annotation file, relative to the source root.
    pub annotations: PathBuf,
    /// Image directory, relative to the source root.
    pub images: PathBuf,
    /// Output split directory name (gets `images/` and `labels/`).
    pub output: String,
}

/// Source and output layout for dataset preparation.
///
/// Defaults follow the COCO 2017 naming: `annotations/instances_*2017.json`
/// next to `train2017/` and `val2017/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    pub train: SplitLayout,
    pub validation: SplitLayout,
    /// Dataset YAML file name, written into the output root.
    pub yaml_name: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            train: SplitLayout {
                annotations: PathBuf::from("annotations/instances_train2017.json"),
                images: PathBuf::from("train2017"),
                output: "train".to_string(),
            },
            validation: SplitLayout {
                annotations: PathBuf::from("annotations/instances_val2017.json"),
                images: PathBuf::from("val2017"),
                output: "validation".to_string(),
            },
            yaml_name: "dataset.yaml".to_string(),
        }
    }
}

impl DatasetLayout {
    pub fn splits(&self) -> [&SplitLayout; 2] {
        [&self.train, &self.validation]
    }
}

/// Dataset description consumed by the YOLO training tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetYaml {
    pub path: String,
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: Vec<String>,
}

impl DatasetYaml {
    pub fn new(root: &Path, layout: &DatasetLayout, names: Vec<String>) -> Self {
        Self {
            path: root.to_string_lossy().into_owned(),
            train: format!("{}/images", layout.train.output),
            val: format!("{}/images", layout.validation.output),
            test: String::new(),
            nc: names.len(),
            names,
        }
    }
}

pub fn write_dataset_yaml(path: &Path, yaml: &DatasetYaml) -> Result<()> {
    let body = serde_yaml::to_string(yaml)?;
    std::fs::write(path, body)?;
    tracing::info!(path = %path.display(), nc = yaml.nc, "wrote dataset YAML");
    Ok(())
}

/// Per-split outcome of [`prepare_dataset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    pub split: String,
    pub conversion: Option<ConversionReport>,
    pub images_copied: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareReport {
    pub output_dir: PathBuf,
    pub yaml_path: PathBuf,
    pub splits: Vec<SplitReport>,
}

/// Build a YOLO training layout from a COCO-style source tree.
///
/// Splits whose annotation file or image directory is missing are logged
/// and skipped; the rest of the layout is still produced.
pub fn prepare_dataset(
    base_dir: &Path,
    output_dir: &Path,
    layout: &DatasetLayout,
    options: &ConvertOptions,
    copy_images: bool,
) -> Result<PrepareReport> {
    tracing::info!(
        source = %base_dir.display(),
        output = %output_dir.display(),
        "preparing YOLO dataset"
    );

    // The trainer resolves a relative `path` against its own datasets dir.
    std::fs::create_dir_all(output_dir)?;
    let yaml_root = std::fs::canonicalize(output_dir)?;

    let mut splits = Vec::with_capacity(2);
    let mut class_names: Option<Vec<String>> = None;

    for split in layout.splits() {
        let split_out = output_dir.join(&split.output);
        let labels_dir = split_out.join("labels");
        let images_out = split_out.join("images");
        std::fs::create_dir_all(&labels_dir)?;
        std::fs::create_dir_all(&images_out)?;

        let ann_path = base_dir.join(&split.annotations);
        let conversion = if ann_path.is_file() {
            let report = convert_coco_to_yolo(&ann_path, &labels_dir, options)?;
            class_names.get_or_insert_with(|| report.class_names.clone());
            Some(report)
        } else {
            tracing::warn!(split = %split.output, path = %ann_path.display(), "annotation file missing, skipping split");
            None
        };

        let images_src = base_dir.join(&split.images);
        let images_copied = if !copy_images {
            0
        } else if images_src.is_dir() {
            copy_image_files(&images_src, &images_out)?
        } else {
            tracing::warn!(split = %split.output, path = %images_src.display(), "image directory missing, nothing copied");
            0
        };

        splits.push(SplitReport {
            split: split.output.clone(),
            conversion,
            images_copied,
        });
    }

    let names = class_names
        .or_else(|| options.target_classes.clone())
        .unwrap_or_default();
    let yaml_path = output_dir.join(&layout.yaml_name);
    write_dataset_yaml(&yaml_path, &DatasetYaml::new(&yaml_root, layout, names))?;

    Ok(PrepareReport {
        output_dir: output_dir.to_path_buf(),
        yaml_path,
        splits,
    })
}

/// Copy every regular file from `src` into `dst`. Returns the number copied.
pub fn copy_image_files(src: &Path, dst: &Path) -> Result<usize> {
    std::fs::create_dir_all(dst)?;

    let files: Vec<PathBuf> = std::fs::read_dir(src)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();

    files.par_iter().try_for_each(|path| -> Result<()> {
        if let Some(name) = path.file_name() {
            std::fs::copy(path, dst.join(name))?;
        }
        Ok(())
    })?;

    tracing::info!(
        from = %src.display(),
        to = %dst.display(),
        count = files.len(),
        "copied images"
    );
    Ok(files.len())
}
