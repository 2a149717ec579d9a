/// Disk image container and address translation

/// ProDOS block addressing
pub mod block;
/// DOS 3.3 track/sector addressing
pub mod sector;

pub use block::BlockView;
pub use sector::SectorView;

use crate::error::{DiskError, Result};
use crate::filesystem::FileSystemType;
use crate::format::{DiskImageFormat, DOS_IMAGE_SIZE, PRODOS_BLOCK_SIZE, PRODOS_MAX_IMAGE_SIZE};
use std::path::Path;

/// An Apple II disk image held in memory
///
/// The buffer is never modified once loaded. Filesystems and file handles
/// borrow it, so they cannot outlive the image.
#[derive(Debug, Clone)]
pub struct DiskImage {
    /// Sector layout of the image
    pub(crate) format: DiskImageFormat,
    /// Raw image bytes (2IMG header already stripped)
    pub(crate) data: Vec<u8>,
    /// Original filename if loaded from disk
    pub(crate) filename: Option<String>,
}

impl DiskImage {
    /// Open an image file from disk
    ///
    /// The layout is picked from the file extension (`.po`, `.hdv`, `.2mg`
    /// are ProDOS, anything else DOS 3.3) unless a 2IMG header says otherwise.
    ///
    /// A 2IMG header's image-format field names the sector order of the
    /// payload, and that order wins over the extension: a `.2mg` file whose
    /// field is 0 (DOS 3.3 order) opens as [`DiskImageFormat::Dos33`] and
    /// mounts the DOS 3.3 catalog by default. ProDOS-order payloads (field 1)
    /// stay ProDOS. A ProDOS volume stored in DOS order is not reinterleaved;
    /// force `FileSystemType::Prodos` to read such a payload as blocks.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::io::read_image(path)
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(data: Vec<u8>, format: DiskImageFormat) -> Self {
        Self {
            format,
            data,
            filename: None,
        }
    }

    /// Get the image layout
    pub fn format(&self) -> DiskImageFormat {
        self.format
    }

    /// Get the filesystem used when none is forced
    pub fn default_filesystem(&self) -> FileSystemType {
        self.format.default_filesystem()
    }

    /// Get the original filename if loaded from disk
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Get the raw image bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the image size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the image holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Track/sector view over the image
    pub fn sectors(&self) -> SectorView<'_> {
        SectorView::new(&self.data)
    }

    /// Block view over the image
    pub fn blocks(&self) -> BlockView<'_> {
        BlockView::new(&self.data)
    }

    /// Strictly check the image size against its format
    ///
    /// Decoding does not require this; short or oversized images simply
    /// yield fewer readable sectors or blocks.
    pub fn validate(&self) -> Result<()> {
        if self.format.accepts_size(self.data.len()) {
            return Ok(());
        }

        let expected = match self.format {
            DiskImageFormat::Dos33 => format!("{} bytes", DOS_IMAGE_SIZE),
            DiskImageFormat::Prodos => format!(
                "a multiple of {} bytes up to {}",
                PRODOS_BLOCK_SIZE, PRODOS_MAX_IMAGE_SIZE
            ),
        };

        Err(DiskError::InvalidImageSize {
            expected,
            actual: self.data.len(),
        })
    }
}
