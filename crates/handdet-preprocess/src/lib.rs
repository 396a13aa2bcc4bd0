pub mod letterbox;

pub use letterbox::{Letterbox, LetterboxOutput, PAD_VALUE};
