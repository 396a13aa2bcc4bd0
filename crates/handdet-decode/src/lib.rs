pub mod image;

pub use self::image::{list_images, ImageDecoder, IMAGE_EXTENSIONS};
