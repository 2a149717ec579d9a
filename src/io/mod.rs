/// I/O operations for loading image files

/// Reader implementation for raw and 2IMG image files
pub mod reader;

pub use reader::{parse_image, read_image};
