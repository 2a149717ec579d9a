/// Apple II disk geometry and on-disk layout constants

/// DOS 3.3 sector size in bytes
pub const DOS_BYTES_PER_SECTOR: usize = 256;

/// DOS 3.3 tracks per disk
pub const DOS_TRACKS_PER_DISK: u8 = 35;

/// DOS 3.3 sectors per track
pub const DOS_SECTORS_PER_TRACK: u8 = 16;

/// Total size of a DOS 3.3 image (35 x 16 x 256)
pub const DOS_IMAGE_SIZE: usize =
    DOS_TRACKS_PER_DISK as usize * DOS_SECTORS_PER_TRACK as usize * DOS_BYTES_PER_SECTOR;

/// Track holding the Volume Table Of Contents
pub const DOS_VTOC_TRACK: u8 = 17;

/// Sector holding the Volume Table Of Contents
pub const DOS_VTOC_SECTOR: u8 = 0;

/// Offset of the next-sector link (track, then sector) in catalog and T/S list sectors
pub const DOS_NEXT_TRACK_OFFSET: usize = 0x01;

/// Offset of the next-sector link sector byte
pub const DOS_NEXT_SECTOR_OFFSET: usize = 0x02;

/// Offset of the first entry slot in a catalog sector
pub const DOS_CATALOG_ENTRY_OFFSET: usize = 0x0B;

/// Size of a catalog entry slot
pub const DOS_CATALOG_ENTRY_SIZE: usize = 0x23;

/// Entry slots per catalog sector
pub const DOS_CATALOG_ENTRIES_PER_SECTOR: usize = 7;

/// Offset of the first (track, sector) pair in a T/S list sector
pub const DOS_TS_LIST_PAIRS_OFFSET: usize = 0x0C;

/// Maximum (track, sector) pairs in one T/S list sector
pub const DOS_TS_LIST_MAX_PAIRS: usize = 122;

/// Offset of the free-sector bitmap in the VTOC (one byte per track)
pub const DOS_VTOC_BITMAP_OFFSET: usize = 0x38;

/// ProDOS block size in bytes
pub const PRODOS_BLOCK_SIZE: usize = 512;

/// Number of addressable ProDOS blocks
pub const PRODOS_MAX_BLOCKS: usize = 65536;

/// Largest ProDOS image (65536 x 512)
pub const PRODOS_MAX_IMAGE_SIZE: usize = PRODOS_MAX_BLOCKS * PRODOS_BLOCK_SIZE;

/// Key block of the volume directory
pub const PRODOS_VOLUME_DIRECTORY_BLOCK: u16 = 2;

/// Size of a directory entry slot
pub const PRODOS_ENTRY_SIZE: usize = 0x27;

/// Offset of the first entry slot in a directory block
pub const PRODOS_DIRECTORY_ENTRY_OFFSET: usize = 4;

/// Offset of the next-block pointer in a directory block
pub const PRODOS_NEXT_BLOCK_OFFSET: usize = 2;

/// Block pointers held by a sapling index block
pub const PRODOS_INDEX_POINTERS: usize = 256;

/// Index block pointers used by a tree master index block
pub const PRODOS_MASTER_INDEX_POINTERS: usize = 128;

/// 2IMG container signature
pub const TWO_IMG_SIGNATURE: &[u8] = b"2IMG";

/// Size of the 2IMG header fields this crate reads
pub const TWO_IMG_HEADER_SIZE: usize = 0x40;

/// Offset of the image-format field (LE32) in a 2IMG header
pub const TWO_IMG_FORMAT_OFFSET: usize = 0x0C;

/// Offset of the data-offset field (LE32) in a 2IMG header
pub const TWO_IMG_DATA_OFFSET_OFFSET: usize = 0x18;

/// Offset of the data-length field (LE32) in a 2IMG header
pub const TWO_IMG_DATA_LENGTH_OFFSET: usize = 0x1C;

/// Read a little-endian u16 at `offset`
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Read a little-endian 24-bit value at `offset`
#[inline]
pub fn read_u24_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], 0])
}

/// Read a little-endian u32 at `offset`
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
