/// Image format detection and constants

/// Format constants
pub mod constants;

pub use constants::*;

use crate::filesystem::FileSystemType;
use std::path::Path;

/// Apple II image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskImageFormat {
    /// DOS 3.3 sector-ordered image (.dsk, .do)
    Dos33,
    /// ProDOS block-ordered image (.po, .hdv, .2mg)
    Prodos,
}

impl DiskImageFormat {
    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            DiskImageFormat::Dos33 => "DOS 3.3",
            DiskImageFormat::Prodos => "ProDOS",
        }
    }

    /// Get the default filesystem type for this image format
    pub fn default_filesystem(&self) -> FileSystemType {
        match self {
            DiskImageFormat::Dos33 => FileSystemType::Dos33,
            DiskImageFormat::Prodos => FileSystemType::Prodos,
        }
    }

    /// Pick a format from a file name
    ///
    /// `.po`, `.hdv` and `.2mg` (any case) are ProDOS; anything else,
    /// including no extension at all, is DOS 3.3.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let prodos = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                e.eq_ignore_ascii_case("po")
                    || e.eq_ignore_ascii_case("hdv")
                    || e.eq_ignore_ascii_case("2mg")
            })
            .unwrap_or(false);

        if prodos {
            DiskImageFormat::Prodos
        } else {
            DiskImageFormat::Dos33
        }
    }

    /// Check a buffer length against what this format allows
    pub fn accepts_size(&self, len: usize) -> bool {
        match self {
            DiskImageFormat::Dos33 => len == DOS_IMAGE_SIZE,
            DiskImageFormat::Prodos => {
                len > 0 && len % PRODOS_BLOCK_SIZE == 0 && len <= PRODOS_MAX_IMAGE_SIZE
            }
        }
    }
}

impl std::fmt::Display for DiskImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Check for a 2IMG container header
pub fn is_two_img(magic: &[u8]) -> bool {
    magic.len() >= TWO_IMG_HEADER_SIZE && magic.starts_with(TWO_IMG_SIGNATURE)
}
