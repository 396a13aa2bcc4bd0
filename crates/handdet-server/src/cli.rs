use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use handdet_core::{HandResult, Result};
use handdet_dataset::{
    convert_coco_to_yolo, inspect_dataset, prepare_dataset, ConversionReport, ConvertOptions, DatasetLayout,
};
use handdet_decode::list_images;
use handdet_pipeline::{save_overlay, HandPipeline};

#[derive(Parser)]
#[command(name = "handdet", version, about = "Hand detection dataset tooling and detection server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a JSON config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// ONNX detector model, overrides the config.
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Detection confidence threshold, overrides the config.
    #[arg(long, global = true)]
    pub conf: Option<f32>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert a COCO annotation file into YOLO label files.
    Convert {
        /// COCO instances JSON.
        #[arg(long)]
        annotations: PathBuf,
        /// Directory that receives the `.txt` label files.
        #[arg(long)]
        output: PathBuf,
        /// Class names to keep, in YOLO id order (comma-separated).
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<String>>,
        /// Write empty label files for images without kept annotations.
        #[arg(long)]
        write_empty: bool,
    },
    /// Build a YOLO training layout and dataset YAML from a COCO tree.
    Prepare {
        /// Source root with `annotations/`, `train2017/` and `val2017/`.
        #[arg(long)]
        data_dir: PathBuf,
        /// Output root.
        #[arg(long)]
        output: PathBuf,
        /// Class names to keep, in YOLO id order (comma-separated).
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<String>>,
        /// Only write labels and YAML, leave images where they are.
        #[arg(long)]
        no_copy: bool,
    },
    /// Report what a dataset directory contains.
    Inspect {
        /// Dataset root.
        #[arg(long)]
        data_dir: PathBuf,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Detect hands in an image or a directory of images.
    Detect {
        /// Image file or directory.
        #[arg(required = true)]
        input: PathBuf,
        /// Write annotated images here (a file for one image, a directory otherwise).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Start the HTTP server.
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to bind to.
        #[arg(long, default_value = "5000")]
        port: u16,
    },
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn merge_classes(options: &ConvertOptions, classes: Option<Vec<String>>) -> ConvertOptions {
    let mut options = options.clone();
    if classes.is_some() {
        options.target_classes = classes;
    }
    options
}

fn print_conversion(report: &ConversionReport) {
    println!(
        "{} labels in {} files ({} annotations, skipped: {} category, {} missing image, {} invalid)",
        report.labels_written,
        report.files_written,
        report.annotations_total,
        report.skipped_category,
        report.skipped_missing_image,
        report.skipped_invalid
    );
    println!("classes: {}", report.class_names.join(", "));
}

pub fn run_convert(
    annotations: &Path,
    output: &Path,
    defaults: &ConvertOptions,
    classes: Option<Vec<String>>,
    write_empty: bool,
) -> Result<()> {
    let mut options = merge_classes(defaults, classes);
    options.write_empty |= write_empty;
    let report = convert_coco_to_yolo(annotations, output, &options)?;
    print_conversion(&report);
    Ok(())
}

pub fn run_prepare(
    data_dir: &Path,
    output: &Path,
    layout: &DatasetLayout,
    defaults: &ConvertOptions,
    classes: Option<Vec<String>>,
    no_copy: bool,
) -> Result<()> {
    let options = merge_classes(defaults, classes);
    let report = prepare_dataset(data_dir, output, layout, &options, !no_copy)?;

    for split in &report.splits {
        println!("--- {} ---", split.split);
        match &split.conversion {
            Some(conversion) => print_conversion(conversion),
            None => println!("no annotations"),
        }
        println!("{} images copied", split.images_copied);
    }
    println!("dataset yaml: {}", report.yaml_path.display());
    Ok(())
}

pub fn run_inspect(data_dir: &Path, layout: &DatasetLayout, json: bool) -> Result<()> {
    let report = inspect_dataset(data_dir, layout)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

/// Detect hands in a file, or in every image of a directory.
///
/// In directory mode a failing image is logged and skipped.
pub fn detect_path(
    pipeline: &HandPipeline,
    input: &Path,
    output: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    if !input.is_dir() {
        return detect_file(pipeline, input, output, format);
    }

    let images = list_images(input)?;
    tracing::info!(dir = %input.display(), images = images.len(), "batch detection");
    if let Some(dir) = output {
        std::fs::create_dir_all(dir)?;
    }

    let mut failed = 0;
    for path in &images {
        let target = output.and_then(|dir| path.file_name().map(|name| dir.join(name)));
        if let Err(e) = detect_file(pipeline, path, target.as_deref(), format) {
            tracing::error!(file = %path.display(), error = %e, "failed");
            failed += 1;
        }
    }

    tracing::info!(total = images.len(), failed, "batch detection finished");
    Ok(())
}

fn detect_file(pipeline: &HandPipeline, path: &Path, output: Option<&Path>, format: &OutputFormat) -> Result<()> {
    let image = pipeline.open(path)?;
    let result = pipeline.process_image(&image)?;

    print_result(pipeline, path, &result, format)?;

    if let Some(out) = output {
        save_overlay(&image, &result.detections, out)?;
        tracing::info!(path = %out.display(), "wrote annotated image");
    }
    Ok(())
}

fn print_result(pipeline: &HandPipeline, path: &Path, result: &HandResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}: {} hand(s)", path.display(), result.num_hands());
            for (i, det) in result.detections.iter().enumerate() {
                let [x1, y1, x2, y2] = det.bbox.to_xyxy();
                println!(
                    "  {} {}: {:.2} [{:.0}, {:.0}, {:.0}, {:.0}]",
                    pipeline.config().class_name(det.class_id),
                    i + 1,
                    det.confidence,
                    x1,
                    y1,
                    x2,
                    y2
                );
            }
            eprintln!("[{:.1}ms detect]", result.timing.detect_ms);
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": path.display().to_string(),
                "num_hands": result.num_hands(),
                "confidences": result.confidences(),
                "boxes": result.boxes_xyxy(),
                "timing": result.timing,
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(())
}
