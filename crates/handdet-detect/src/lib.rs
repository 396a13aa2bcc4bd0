pub mod engine;
pub mod nms;
pub mod postprocess;

pub use engine::YoloEngine;
pub use nms::non_max_suppression;
pub use postprocess::{OutputLayout, Postprocessor};
