/// Filesystem implementations

/// Loop protection for linked on-disk chains
pub mod chain;
/// Apple DOS 3.3
pub mod dos33;
/// ProDOS
pub mod prodos;

pub use chain::ChainGuard;
pub use dos33::{CatalogSector, Dos33FileSystem, DosCatalogEntry, DosFile, DosFileType, Vtoc};
pub use prodos::{
    binary_string, DirectoryHeader, EntryKind, FileFields, ProdosEntry, ProdosFile,
    ProdosFileSystem, StorageType, VolumeHeader,
};

use crate::error::{DiskError, Result};
use crate::image::DiskImage;

/// Summary of one catalog entry, as shown in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name, trimmed
    pub name: String,
    /// Size in bytes as derived by the filesystem
    pub size: usize,
    /// Type tag
    pub file_type: String,
    /// Access/lock flags
    pub flags: String,
}

/// Filesystem information
#[derive(Debug)]
pub struct FileSystemInfo {
    /// Filesystem type name
    pub fs_type: String,
    /// Volume name or number
    pub volume: String,
    /// Total allocation units (sectors or blocks)
    pub total_blocks: usize,
    /// Free allocation units according to the on-disk bitmap
    pub free_blocks: usize,
    /// Allocation unit size in bytes
    pub block_size: usize,
    /// Number of entries returned by `list_files`
    pub file_count: usize,
}

impl std::fmt::Display for FileSystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} Filesystem ({})", self.fs_type, self.volume)?;
        writeln!(f, "  Files: {}", self.file_count)?;
        writeln!(
            f,
            "  Total: {} x {} bytes ({} KB)",
            self.total_blocks,
            self.block_size,
            self.total_blocks * self.block_size / 1024
        )?;
        writeln!(
            f,
            "  Free: {} ({} KB)",
            self.free_blocks,
            self.free_blocks * self.block_size / 1024
        )?;
        Ok(())
    }
}

/// A decoded file whose content is read on demand
///
/// Name, size, type and flags are computed when the entry is decoded;
/// `content` walks the image each time it is called.
pub trait FileHandle {
    /// File name
    fn name(&self) -> &str;

    /// Size in bytes as derived by the filesystem (not necessarily exact)
    fn size(&self) -> usize;

    /// Type tag rendered as text
    fn file_type(&self) -> &str;

    /// Flags rendered as text
    fn flags(&self) -> &str;

    /// Reconstruct the file's bytes; `None` if they cannot be located
    fn content(&self) -> Option<Vec<u8>>;

    /// Whether lookups by name may resolve to this entry
    ///
    /// Directory and volume header entries share a name with the directory
    /// they describe and are listed but never looked up.
    fn is_addressable(&self) -> bool {
        true
    }

    /// Get the listing summary of this file
    fn to_dir_entry(&self) -> DirEntry {
        DirEntry {
            name: self.name().to_string(),
            size: self.size(),
            file_type: self.file_type().to_string(),
            flags: self.flags().to_string(),
        }
    }
}

/// Filesystem trait for reading files from Apple II images
pub trait FileSystem {
    /// List the files of the root catalog in on-disk order
    fn list_files(&self) -> Vec<Box<dyn FileHandle + '_>>;

    /// Get filesystem information
    fn info(&self) -> FileSystemInfo;

    /// List directory entries
    fn read_dir(&self) -> Vec<DirEntry> {
        self.list_files().iter().map(|f| f.to_dir_entry()).collect()
    }

    /// Read a file's contents by name (case-insensitive)
    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let files = self.list_files();
        let file = files
            .iter()
            .find(|f| f.is_addressable() && f.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| DiskError::FileNotFound(name.to_string()))?;

        file.content()
            .ok_or_else(|| DiskError::NoContent(file.name().to_string()))
    }
}

/// Filesystem selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystemType {
    /// Decide from the image format
    Auto,
    /// DOS 3.3 catalog
    Dos33,
    /// ProDOS directory
    Prodos,
}

impl FileSystemType {
    /// Parse a filesystem name as typed by a user
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(FileSystemType::Auto),
            "dos" | "dos33" | "dos3.3" => Some(FileSystemType::Dos33),
            "prodos" => Some(FileSystemType::Prodos),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileSystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemType::Auto => write!(f, "auto"),
            FileSystemType::Dos33 => write!(f, "DOS 3.3"),
            FileSystemType::Prodos => write!(f, "ProDOS"),
        }
    }
}

/// Mount a filesystem over an image
///
/// `Auto` follows the image format, which in turn came from the file
/// extension or 2IMG header.
pub fn open_filesystem(image: &DiskImage, fs_type: FileSystemType) -> Box<dyn FileSystem + '_> {
    let effective = match fs_type {
        FileSystemType::Auto => image.default_filesystem(),
        other => other,
    };

    match effective {
        FileSystemType::Prodos => Box::new(ProdosFileSystem::from_image(image)),
        _ => Box::new(Dos33FileSystem::from_image(image)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DiskImageFormat;

    #[test]
    fn test_filesystem_type_from_name() {
        assert_eq!(FileSystemType::from_name("AUTO"), Some(FileSystemType::Auto));
        assert_eq!(FileSystemType::from_name("dos33"), Some(FileSystemType::Dos33));
        assert_eq!(FileSystemType::from_name("ProDOS"), Some(FileSystemType::Prodos));
        assert_eq!(FileSystemType::from_name("cpm"), None);
    }

    #[test]
    fn test_open_filesystem_follows_format() {
        let image = DiskImage::from_bytes(vec![0; 143_360], DiskImageFormat::Prodos);
        assert_eq!(open_filesystem(&image, FileSystemType::Auto).info().fs_type, "ProDOS");
        assert_eq!(open_filesystem(&image, FileSystemType::Dos33).info().fs_type, "DOS 3.3");

        let image = DiskImage::from_bytes(vec![0; 143_360], DiskImageFormat::Dos33);
        assert_eq!(open_filesystem(&image, FileSystemType::Auto).info().fs_type, "DOS 3.3");
    }

    #[test]
    fn test_empty_image_lists_nothing() {
        let image = DiskImage::from_bytes(Vec::new(), DiskImageFormat::Dos33);
        assert!(open_filesystem(&image, FileSystemType::Dos33).list_files().is_empty());
        assert!(open_filesystem(&image, FileSystemType::Prodos).list_files().is_empty());
    }
}
