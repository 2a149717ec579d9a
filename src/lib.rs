/*!
# a2disk

A Rust library for reading Apple II disk images with DOS 3.3 and ProDOS filesystem support.

## Features

- DOS 3.3 140K images: VTOC, catalog chain, Track/Sector list chains
- ProDOS block images up to 32MB: volume and subdirectory chains, seedling/sapling/tree files
- Raw `.dsk`/`.do`/`.po`/`.hdv` files and 2IMG (`.2mg`) containers
- Zero-copy, bounds-checked sector and block views; walks stop on loops
- Read-only: the image buffer is never modified

## Quick Start

```rust,no_run
use a2disk::{open_filesystem, DiskImage, FileSystemType};

// Open an existing image; the extension picks DOS 3.3 or ProDOS
let image = DiskImage::open("master.dsk")?;

// Read a sector
let vtoc = image.sectors().read_sector(17, 0);

// Mount the filesystem and list the catalog
let fs = open_filesystem(&image, FileSystemType::Auto);
for file in fs.list_files() {
    println!("{}: {} bytes ({})", file.name(), file.size(), file.file_type());
}

// Read a file
let contents = fs.read_file("HELLO")?;
# Ok::<(), a2disk::DiskError>(())
```

## Modules

- `format`: image formats, geometry and layout constants
- `image`: the image buffer and its sector/block views
- `filesystem`: DOS 3.3 and ProDOS implementations
- `io`: loading image files
- `map`: free-space maps
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// Error types and Result alias
pub mod error;
/// DOS 3.3 and ProDOS filesystems
pub mod filesystem;
/// Image formats, geometry and layout constants
pub mod format;
/// Image buffer and address translation
pub mod image;
/// I/O operations for loading image files
pub mod io;
/// Free-space map visualization
pub mod map;

// Re-export common types
pub use error::{DiskError, Result};
pub use filesystem::{
    open_filesystem, DirEntry, Dos33FileSystem, DosFile, DosFileType, EntryKind, FileHandle,
    FileSystem, FileSystemInfo, FileSystemType, ProdosEntry, ProdosFile, ProdosFileSystem,
    StorageType, Vtoc,
};
pub use format::DiskImageFormat;
pub use image::sector::TrackSector;
pub use image::{BlockView, DiskImage, SectorView};
