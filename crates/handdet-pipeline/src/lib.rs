pub mod config;
pub mod overlay;
pub mod pipeline;

pub use config::PipelineConfig;
pub use overlay::{draw_detections, save_overlay};
pub use pipeline::HandPipeline;
