//! Read-only dataset health report.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use handdet_core::Result;
use serde::Serialize;

use crate::layout::DatasetLayout;
use crate::yolo::YoloLabel;

const ARCHIVE_NAME: &str = "to_coco.zip";
const CONFIG_NAME: &str = "hand_detection_dataset.json";
const ARCHIVE_PREVIEW: usize = 20;

/// Outcome of looking for one optional dataset artifact.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Artifact<T> {
    Missing,
    Found(T),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub preview: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageDirSummary {
    pub path: PathBuf,
    pub images: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelDirSummary {
    pub path: PathBuf,
    pub files: usize,
    pub labels: usize,
    pub malformed_lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub train: serde_json::Value,
    pub validation: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub root: PathBuf,
    pub archive: Artifact<ArchiveSummary>,
    pub image_dirs: Vec<ImageDirSummary>,
    pub label_dirs: Vec<LabelDirSummary>,
    pub config: Artifact<ConfigSummary>,
}

/// Inspect a dataset root. Only an unreadable root is an error; problems
/// with individual artifacts are recorded in the report.
///
/// Image and label folders are looked up from `layout`: the COCO source
/// image dirs plus `<output>/images` and `<output>/labels` per split.
pub fn inspect_dataset(root: &Path, layout: &DatasetLayout) -> Result<DatasetReport> {
    std::fs::metadata(root)?;

    let archive = lookup(&root.join(ARCHIVE_NAME), read_archive);
    let config = lookup(&root.join(CONFIG_NAME), read_config);

    let image_dirs = image_dir_candidates(root, layout)
        .into_iter()
        .filter(|p| p.is_dir())
        .map(|path| {
            let images = count_images(&path);
            ImageDirSummary { path, images }
        })
        .collect();

    let label_dirs = layout
        .splits()
        .iter()
        .map(|split| root.join(&split.output).join("labels"))
        .filter(|p| p.is_dir())
        .map(|p| summarize_labels(&p))
        .collect();

    let report = DatasetReport {
        root: root.to_path_buf(),
        archive,
        image_dirs,
        label_dirs,
        config,
    };
    tracing::debug!(root = %root.display(), "dataset inspected");
    Ok(report)
}

fn image_dir_candidates(root: &Path, layout: &DatasetLayout) -> Vec<PathBuf> {
    let sources = layout.splits().map(|split| root.join(&split.images));
    let outputs = layout
        .splits()
        .map(|split| root.join(&split.output).join("images"));

    let mut dirs: Vec<PathBuf> = Vec::with_capacity(4);
    for dir in sources.into_iter().chain(outputs) {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

fn lookup<T>(path: &Path, read: impl FnOnce(&Path) -> Result<T>) -> Artifact<T> {
    if !path.exists() {
        return Artifact::Missing;
    }
    match read(path) {
        Ok(v) => Artifact::Found(v),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read dataset artifact");
            Artifact::Failed(e.to_string())
        }
    }
}

fn read_archive(path: &Path) -> Result<ArchiveSummary> {
    let archive = zip::ZipArchive::new(File::open(path)?)
        .map_err(|e| handdet_core::DetError::Dataset(format!("zip error: {e}")))?;
    Ok(ArchiveSummary {
        entries: archive.len(),
        preview: archive
            .file_names()
            .take(ARCHIVE_PREVIEW)
            .map(str::to_owned)
            .collect(),
    })
}

fn read_config(path: &Path) -> Result<ConfigSummary> {
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let default = value.get("default").cloned().unwrap_or_default();
    let section = |key: &str| {
        default
            .get(key)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    };
    Ok(ConfigSummary {
        train: section("train"),
        validation: section("validation"),
    })
}

fn has_image_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

fn count_images(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| has_image_ext(&e.path()))
                .count()
        })
        .unwrap_or(0)
}

fn summarize_labels(dir: &Path) -> LabelDirSummary {
    let mut summary = LabelDirSummary {
        path: dir.to_path_buf(),
        files: 0,
        labels: 0,
        malformed_lines: 0,
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return summary;
    };
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        if path.extension().map_or(true, |e| e != "txt") {
            continue;
        }
        summary.files += 1;
        let Ok(body) = std::fs::read_to_string(&path) else {
            summary.malformed_lines += 1;
            continue;
        };
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            match line.parse::<YoloLabel>() {
                Ok(_) => summary.labels += 1,
                Err(_) => summary.malformed_lines += 1,
            }
        }
    }
    summary
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== dataset report: {} ===", self.root.display())?;

        match &self.archive {
            Artifact::Missing => writeln!(f, "[missing] archive {ARCHIVE_NAME}")?,
            Artifact::Failed(e) => writeln!(f, "[error]   archive {ARCHIVE_NAME}: {e}")?,
            Artifact::Found(a) => {
                writeln!(f, "[ok]      archive {ARCHIVE_NAME}: {} entries", a.entries)?;
                for name in &a.preview {
                    writeln!(f, "            {name}")?;
                }
                if a.entries > a.preview.len() {
                    writeln!(f, "            ... {} more", a.entries - a.preview.len())?;
                }
            }
        }

        if self.image_dirs.is_empty() {
            writeln!(f, "[missing] no image directories")?;
        }
        for d in &self.image_dirs {
            writeln!(f, "[ok]      {}: {} images", d.path.display(), d.images)?;
        }
        for d in &self.label_dirs {
            writeln!(
                f,
                "[ok]      {}: {} files, {} labels, {} malformed lines",
                d.path.display(),
                d.files,
                d.labels,
                d.malformed_lines
            )?;
        }

        match &self.config {
            Artifact::Missing => writeln!(f, "[missing] config {CONFIG_NAME}")?,
            Artifact::Failed(e) => writeln!(f, "[error]   config {CONFIG_NAME}: {e}")?,
            Artifact::Found(c) => {
                writeln!(f, "[ok]      config {CONFIG_NAME}")?;
                writeln!(f, "            train: {}", c.train)?;
                writeln!(f, "            validation: {}", c.validation)?;
            }
        }
        Ok(())
    }
}
