/// ProDOS filesystem implementation
///
/// Layout of a ProDOS volume:
/// - 512-byte blocks, up to 65536 of them
/// - Volume directory starting at block 2, blocks linked by next pointer
/// - 0x27-byte entries, thirteen per directory block, starting at offset 4
/// - The first entry of the volume directory is the volume header, the
///   first entry of a subdirectory is the subdirectory header
/// - Files are stored as seedling (1 data block), sapling (index block) or
///   tree (master index of index blocks)

use crate::error::{DiskError, Result};
use crate::filesystem::{ChainGuard, FileHandle, FileSystem, FileSystemInfo};
use crate::format::constants::*;
use crate::image::{BlockView, DiskImage};
use tracing::{debug, warn};

/// Storage type, the high nibble of an entry's first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Deleted entry (0x0)
    Deleted,
    /// Key block holds the data, up to 512 bytes (0x1)
    Seedling,
    /// Key block lists up to 256 data blocks (0x2)
    Sapling,
    /// Key block lists up to 128 index blocks (0x3)
    Tree,
    /// Pascal area on a ProFile hard disk (0x4)
    Pascal,
    /// GS/OS forked file (0x5)
    GsosFork,
    /// Subdirectory file entry (0xD)
    Subdirectory,
    /// Subdirectory header entry (0xE)
    SubdirectoryHeader,
    /// Volume directory header entry (0xF)
    VolumeHeader,
    /// Any other nibble (0x6 to 0xC)
    Unknown(u8),
}

impl StorageType {
    /// Parse the storage type from the high nibble of byte 0
    pub fn from_byte(byte: u8) -> Self {
        match byte >> 4 {
            0x0 => StorageType::Deleted,
            0x1 => StorageType::Seedling,
            0x2 => StorageType::Sapling,
            0x3 => StorageType::Tree,
            0x4 => StorageType::Pascal,
            0x5 => StorageType::GsosFork,
            0xD => StorageType::Subdirectory,
            0xE => StorageType::SubdirectoryHeader,
            0xF => StorageType::VolumeHeader,
            other => StorageType::Unknown(other),
        }
    }

    /// Get the 4-bit tag value
    pub fn nibble(&self) -> u8 {
        match self {
            StorageType::Deleted => 0x0,
            StorageType::Seedling => 0x1,
            StorageType::Sapling => 0x2,
            StorageType::Tree => 0x3,
            StorageType::Pascal => 0x4,
            StorageType::GsosFork => 0x5,
            StorageType::Subdirectory => 0xD,
            StorageType::SubdirectoryHeader => 0xE,
            StorageType::VolumeHeader => 0xF,
            StorageType::Unknown(n) => *n,
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Deleted => write!(f, "Deleted"),
            StorageType::Seedling => write!(f, "Seedling"),
            StorageType::Sapling => write!(f, "Sapling"),
            StorageType::Tree => write!(f, "Tree"),
            StorageType::Pascal => write!(f, "Pascal Area"),
            StorageType::GsosFork => write!(f, "GS/OS Fork"),
            StorageType::Subdirectory => write!(f, "Subdirectory"),
            StorageType::SubdirectoryHeader => write!(f, "Subdirectory Header"),
            StorageType::VolumeHeader => write!(f, "Volume Header"),
            StorageType::Unknown(n) => write!(f, "Unknown 0x{:X}", n),
        }
    }
}

/// Fields of a file or subdirectory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFields {
    /// ProDOS file type
    pub file_type: u8,
    /// Block where storage begins
    pub key_pointer: u16,
    /// Blocks allocated, index blocks included
    pub blocks_used: u16,
    /// Byte length (24 bits)
    pub eof: u32,
    /// Creation date/time, raw
    pub creation: [u8; 4],
    /// Version that created the file
    pub version: u8,
    /// Minimum version able to read it
    pub min_version: u8,
    /// Access flags (D R B - - I W R)
    pub access: u8,
    /// Auxiliary type (load address, record length...)
    pub aux_type: u16,
    /// Modification date/time, raw
    pub modification: [u8; 4],
    /// Key block of the directory holding this entry
    pub header_pointer: u16,
}

impl FileFields {
    fn parse(raw: &[u8]) -> Self {
        Self {
            file_type: raw[0x10],
            key_pointer: read_u16_le(raw, 0x11),
            blocks_used: read_u16_le(raw, 0x13),
            eof: read_u24_le(raw, 0x15),
            creation: timestamp(raw, 0x18),
            version: raw[0x1C],
            min_version: raw[0x1D],
            access: raw[0x1E],
            aux_type: read_u16_le(raw, 0x1F),
            modification: timestamp(raw, 0x21),
            header_pointer: read_u16_le(raw, 0x25),
        }
    }
}

/// Fields of a subdirectory header entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHeader {
    /// Creation date/time, raw
    pub creation: [u8; 4],
    /// Version that created the directory
    pub version: u8,
    /// Minimum version able to read it
    pub min_version: u8,
    /// Access flags
    pub access: u8,
    /// Entry length, normally 0x27
    pub entry_length: u8,
    /// Entries per block, normally 0x0D
    pub entries_per_block: u8,
    /// Active entries, header excluded
    pub active_entries: u16,
    /// Block of the parent directory holding this directory's entry
    pub parent_pointer: u16,
    /// Entry number within that parent block (1-based)
    pub parent_entry_number: u8,
    /// Entry length in the parent directory
    pub parent_entry_length: u8,
}

impl DirectoryHeader {
    fn parse(raw: &[u8]) -> Self {
        Self {
            creation: timestamp(raw, 0x18),
            version: raw[0x1C],
            min_version: raw[0x1D],
            access: raw[0x1E],
            entry_length: raw[0x1F],
            entries_per_block: raw[0x20],
            active_entries: read_u16_le(raw, 0x21),
            parent_pointer: read_u16_le(raw, 0x23),
            parent_entry_number: raw[0x25],
            parent_entry_length: raw[0x26],
        }
    }
}

/// Fields of the volume directory header entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHeader {
    /// GS/OS modification date/time, raw
    pub modification: [u8; 4],
    /// GS/OS lower-case name flags
    pub lower_case_flags: u16,
    /// Creation date/time, raw
    pub creation: [u8; 4],
    /// Version that formatted the volume
    pub version: u8,
    /// Minimum version able to read it
    pub min_version: u8,
    /// Access flags
    pub access: u8,
    /// Entry length, normally 0x27
    pub entry_length: u8,
    /// Entries per block, normally 0x0D
    pub entries_per_block: u8,
    /// Active entries in the volume directory, header excluded
    pub active_entries: u16,
    /// First block of the free-block bitmap
    pub bitmap_pointer: u16,
    /// Total blocks on the volume
    pub total_blocks: u16,
}

impl VolumeHeader {
    fn parse(raw: &[u8]) -> Self {
        Self {
            modification: timestamp(raw, 0x12),
            lower_case_flags: read_u16_le(raw, 0x16),
            creation: timestamp(raw, 0x18),
            version: raw[0x1C],
            min_version: raw[0x1D],
            access: raw[0x1E],
            entry_length: raw[0x1F],
            entries_per_block: raw[0x20],
            active_entries: read_u16_le(raw, 0x21),
            bitmap_pointer: read_u16_le(raw, 0x23),
            total_blocks: read_u16_le(raw, 0x25),
        }
    }
}

/// Layout-specific part of a directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Seedling, sapling or tree file
    File(FileFields),
    /// Subdirectory file entry
    Subdirectory(FileFields),
    /// Subdirectory header
    SubdirectoryHeader(DirectoryHeader),
    /// Volume directory header
    VolumeHeader(VolumeHeader),
    /// Deleted entry that still has a name
    Deleted,
    /// Pascal area
    Pascal,
    /// GS/OS forked file
    GsosFork,
    /// Unrecognised storage type
    Unknown,
}

/// Directory entry (0x27 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProdosEntry {
    /// Storage type tag
    pub storage_type: StorageType,
    /// Name, trimmed
    pub name: String,
    /// Layout-specific fields
    pub kind: EntryKind,
    /// Raw slot bytes
    pub raw: [u8; PRODOS_ENTRY_SIZE],
}

impl ProdosEntry {
    /// Decode a 0x27-byte slot
    ///
    /// Returns `None` for an unused slot (name length 0 or a blank name).
    /// Unknown storage types decode to `EntryKind::Unknown`.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < PRODOS_ENTRY_SIZE {
            return None;
        }

        let name_length = (data[0] & 0x0F) as usize;
        if name_length == 0 {
            return None;
        }

        let name = data[1..1 + name_length]
            .iter()
            .map(|&b| if b == 0 { ' ' } else { b as char })
            .collect::<String>()
            .trim()
            .to_string();
        if name.is_empty() {
            return None;
        }

        let mut raw = [0u8; PRODOS_ENTRY_SIZE];
        raw.copy_from_slice(&data[..PRODOS_ENTRY_SIZE]);

        let storage_type = StorageType::from_byte(data[0]);
        let kind = match storage_type {
            StorageType::Seedling | StorageType::Sapling | StorageType::Tree => {
                EntryKind::File(FileFields::parse(&raw))
            }
            StorageType::Subdirectory => EntryKind::Subdirectory(FileFields::parse(&raw)),
            StorageType::SubdirectoryHeader => {
                EntryKind::SubdirectoryHeader(DirectoryHeader::parse(&raw))
            }
            StorageType::VolumeHeader => EntryKind::VolumeHeader(VolumeHeader::parse(&raw)),
            StorageType::Deleted => EntryKind::Deleted,
            StorageType::Pascal => EntryKind::Pascal,
            StorageType::GsosFork => EntryKind::GsosFork,
            StorageType::Unknown(_) => EntryKind::Unknown,
        };

        Some(Self {
            storage_type,
            name,
            kind,
            raw,
        })
    }

    /// Get file fields for file and subdirectory entries
    pub fn file_fields(&self) -> Option<&FileFields> {
        match &self.kind {
            EntryKind::File(f) | EntryKind::Subdirectory(f) => Some(f),
            _ => None,
        }
    }

    /// Get the access byte, where the layout has one
    pub fn access(&self) -> Option<u8> {
        match &self.kind {
            EntryKind::File(f) | EntryKind::Subdirectory(f) => Some(f.access),
            EntryKind::SubdirectoryHeader(h) => Some(h.access),
            EntryKind::VolumeHeader(v) => Some(v.access),
            _ => None,
        }
    }

    /// Allocated size: blocks used x 512, which may exceed the EOF by up to a block
    pub fn size(&self) -> usize {
        self.file_fields()
            .map(|f| f.blocks_used as usize * PRODOS_BLOCK_SIZE)
            .unwrap_or(0)
    }

    /// Check for an unrecognised storage type
    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, EntryKind::Unknown)
    }

    /// Type tag: storage type byte (high nibble, low bits clear), file type
    /// and aux type in decimal, separated by colons
    ///
    /// Entries without file fields leave the last two empty, so a volume
    /// header renders as `"240::"`.
    pub fn type_tag(&self) -> String {
        let storage = self.storage_type.nibble() << 4;
        match self.file_fields() {
            Some(f) => format!("{}:{}:{}", storage, f.file_type, f.aux_type),
            None => format!("{}::", storage),
        }
    }
}

fn timestamp(raw: &[u8], offset: usize) -> [u8; 4] {
    [raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]]
}

/// Render bytes as fixed-width binary digits, eight per byte
pub fn binary_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:08b}", b)).collect()
}

/// A directory entry with on-demand content
#[derive(Debug, Clone)]
pub struct ProdosFile<'a> {
    volume: ProdosFileSystem<'a>,
    entry: ProdosEntry,
    type_tag: String,
    flags: String,
}

impl<'a> ProdosFile<'a> {
    fn new(volume: ProdosFileSystem<'a>, entry: ProdosEntry) -> Self {
        let type_tag = entry.type_tag();
        let flags = entry
            .access()
            .map(|a| binary_string(&[a]))
            .unwrap_or_default();
        Self {
            volume,
            entry,
            type_tag,
            flags,
        }
    }

    /// Get the decoded directory entry
    pub fn entry(&self) -> &ProdosEntry {
        &self.entry
    }

    /// Get the storage type
    pub fn storage_type(&self) -> StorageType {
        self.entry.storage_type
    }

    /// Creation timestamp as binary digits, for entries that have one
    pub fn creation_time(&self) -> Option<String> {
        match &self.entry.kind {
            EntryKind::File(f) | EntryKind::Subdirectory(f) => Some(binary_string(&f.creation)),
            EntryKind::SubdirectoryHeader(h) => Some(binary_string(&h.creation)),
            EntryKind::VolumeHeader(v) => Some(binary_string(&v.creation)),
            _ => None,
        }
    }

    /// Modification timestamp as binary digits, for entries that have one
    pub fn modification_time(&self) -> Option<String> {
        match &self.entry.kind {
            EntryKind::File(f) | EntryKind::Subdirectory(f) => {
                Some(binary_string(&f.modification))
            }
            EntryKind::VolumeHeader(v) => Some(binary_string(&v.modification)),
            _ => None,
        }
    }
}

impl FileHandle for ProdosFile<'_> {
    fn name(&self) -> &str {
        &self.entry.name
    }

    fn size(&self) -> usize {
        self.entry.size()
    }

    fn file_type(&self) -> &str {
        &self.type_tag
    }

    fn flags(&self) -> &str {
        &self.flags
    }

    fn content(&self) -> Option<Vec<u8>> {
        match &self.entry.kind {
            EntryKind::File(f) => self.volume.read_fork(self.entry.storage_type, f),
            _ => None,
        }
    }

    fn is_addressable(&self) -> bool {
        matches!(
            self.entry.kind,
            EntryKind::File(_) | EntryKind::Subdirectory(_)
        )
    }
}

/// ProDOS filesystem over a block image
#[derive(Debug, Clone, Copy)]
pub struct ProdosFileSystem<'a> {
    blocks: BlockView<'a>,
    /// Highest usable block + 1: the buffer size, capped by the volume header
    block_limit: usize,
}

impl<'a> ProdosFileSystem<'a> {
    /// Create a filesystem over a raw buffer
    pub fn new(data: &'a [u8]) -> Self {
        let blocks = BlockView::new(data);
        let mut volume = Self {
            blocks,
            block_limit: blocks.block_count(),
        };

        if let Some((_, header)) = volume.volume_header() {
            if header.total_blocks > 0 {
                volume.block_limit = volume.block_limit.min(header.total_blocks as usize);
            }
        }

        volume
    }

    /// Create a filesystem over an image
    pub fn from_image(image: &'a DiskImage) -> Self {
        Self::new(image.data())
    }

    /// Read a 512-byte block
    ///
    /// Returns `None` outside 0..65536, past the end of the buffer, or past
    /// the volume's declared block count.
    pub fn read_block(&self, block: u32) -> Option<&'a [u8]> {
        if block as usize >= self.block_limit {
            return None;
        }
        debug!(block, "read block");
        self.blocks.read_block(block)
    }

    /// Number of blocks the filesystem will read
    pub fn block_count(&self) -> usize {
        self.block_limit
    }

    /// Decode the volume header from the first volume directory entry
    pub fn volume_header(&self) -> Option<(String, VolumeHeader)> {
        let block = self.blocks.read_block(PRODOS_VOLUME_DIRECTORY_BLOCK as u32)?;
        let entry = ProdosEntry::decode(&block[PRODOS_DIRECTORY_ENTRY_OFFSET..])?;
        match entry.kind {
            EntryKind::VolumeHeader(header) => Some((entry.name, header)),
            _ => None,
        }
    }

    /// Walk a directory's block chain and decode every used slot
    ///
    /// Unknown storage types are kept (and reported); callers decide
    /// whether to show them. Stops at a zero next pointer, an unreadable
    /// block or a revisited block.
    pub fn read_directory(&self, key_block: u16) -> Vec<ProdosEntry> {
        let mut guard = ChainGuard::new("prodos directory");
        let mut entries = Vec::new();
        let mut block = key_block;

        while block != 0 {
            if !guard.visit(block) {
                break;
            }

            let data = match self.read_block(block as u32) {
                Some(d) => d,
                None => {
                    debug!(block, "directory block unreadable, stopping");
                    break;
                }
            };

            let next = read_u16_le(data, PRODOS_NEXT_BLOCK_OFFSET);

            let mut offset = PRODOS_DIRECTORY_ENTRY_OFFSET;
            while offset + PRODOS_ENTRY_SIZE <= PRODOS_BLOCK_SIZE {
                if let Some(entry) = ProdosEntry::decode(&data[offset..offset + PRODOS_ENTRY_SIZE]) {
                    if entry.is_unknown() {
                        warn!(
                            block,
                            offset,
                            tag = entry.storage_type.nibble(),
                            name = %entry.name,
                            "unknown storage type"
                        );
                    }
                    entries.push(entry);
                }
                offset += PRODOS_ENTRY_SIZE;
            }

            block = next;
        }

        entries
    }

    /// List the volume directory, unknown entries skipped
    pub fn entries(&self) -> Vec<ProdosFile<'a>> {
        debug!("listing ProDOS volume directory");
        self.files_in(PRODOS_VOLUME_DIRECTORY_BLOCK)
    }

    /// List a subdirectory given its file entry
    ///
    /// Returns `None` if the entry is not a subdirectory.
    pub fn read_subdirectory(&self, entry: &ProdosEntry) -> Option<Vec<ProdosFile<'a>>> {
        match &entry.kind {
            EntryKind::Subdirectory(f) => Some(self.files_in(f.key_pointer)),
            _ => None,
        }
    }

    /// List a subdirectory of the volume directory by name (case-insensitive)
    pub fn list_directory(&self, name: &str) -> Result<Vec<ProdosFile<'a>>> {
        let dir = self
            .find_file(name)
            .ok_or_else(|| DiskError::FileNotFound(name.to_string()))?;
        self.read_subdirectory(dir.entry())
            .ok_or_else(|| DiskError::filesystem(format!("{} is not a directory", dir.name())))
    }

    /// Find a file or subdirectory in the volume directory by name
    /// (case-insensitive); header entries are never matched
    pub fn find_file(&self, name: &str) -> Option<ProdosFile<'a>> {
        self.entries()
            .into_iter()
            .find(|f| f.is_addressable() && f.name().eq_ignore_ascii_case(name))
    }

    fn files_in(&self, key_block: u16) -> Vec<ProdosFile<'a>> {
        self.read_directory(key_block)
            .into_iter()
            .filter(|e| !e.is_unknown())
            .map(|e| ProdosFile::new(*self, e))
            .collect()
    }

    /// Reconstruct a file's data fork, truncated to its EOF
    fn read_fork(&self, storage_type: StorageType, fields: &FileFields) -> Option<Vec<u8>> {
        if fields.key_pointer == 0 {
            return None;
        }

        let eof = fields.eof as usize;
        let key = fields.key_pointer as u32;
        // The EOF is untrusted; reserve no more than one index level can hold
        let reserve = match storage_type {
            StorageType::Seedling => eof.min(PRODOS_BLOCK_SIZE),
            _ => eof.min(PRODOS_INDEX_POINTERS * PRODOS_BLOCK_SIZE),
        };
        let mut data = Vec::with_capacity(reserve);

        match storage_type {
            StorageType::Seedling => {
                let block = self.read_block(key)?;
                data.extend_from_slice(&block[..eof.min(PRODOS_BLOCK_SIZE)]);
            }
            StorageType::Sapling => {
                self.append_index(key, eof, &mut data)?;
            }
            StorageType::Tree => {
                let master = self.read_index(key)?;
                for &index_block in master.iter().take(PRODOS_MASTER_INDEX_POINTERS) {
                    if data.len() >= eof {
                        break;
                    }
                    if index_block == 0 {
                        let sparse = (eof - data.len()).min(PRODOS_INDEX_POINTERS * PRODOS_BLOCK_SIZE);
                        data.resize(data.len() + sparse, 0);
                    } else {
                        self.append_index(index_block as u32, eof, &mut data)?;
                    }
                }
            }
            _ => return None,
        }

        Some(data)
    }

    /// Append the data blocks listed by one index block, stopping at `eof`
    fn append_index(&self, index_block: u32, eof: usize, data: &mut Vec<u8>) -> Option<()> {
        let pointers = self.read_index(index_block)?;
        for &pointer in pointers.iter() {
            if data.len() >= eof {
                break;
            }
            let take = (eof - data.len()).min(PRODOS_BLOCK_SIZE);
            if pointer == 0 {
                data.resize(data.len() + take, 0);
            } else {
                let block = self.read_block(pointer as u32)?;
                data.extend_from_slice(&block[..take]);
            }
        }
        Some(())
    }

    fn read_index(&self, block: u32) -> Option<[u16; PRODOS_INDEX_POINTERS]> {
        if block as usize >= self.block_limit {
            return None;
        }
        self.blocks.read_index_block(block)
    }

    /// Read the volume bitmap as one flag per block (true = free)
    ///
    /// Bits are MSB first, bit set = free. Returns `None` without a volume
    /// header; stops early if a bitmap block cannot be read.
    pub fn block_bitmap(&self) -> Option<Vec<bool>> {
        let (_, header) = self.volume_header()?;

        let bits_per_block = PRODOS_BLOCK_SIZE * 8;
        let total = header.total_blocks as usize;
        let mut free = Vec::with_capacity(total);

        for bitmap_block in 0..total.div_ceil(bits_per_block) {
            let data = match self.read_block(header.bitmap_pointer as u32 + bitmap_block as u32) {
                Some(d) => d,
                None => break,
            };
            let first = bitmap_block * bits_per_block;
            let count = (total - first).min(bits_per_block);
            free.extend((0..count).map(|bit| data[bit / 8] & (0x80 >> (bit % 8)) != 0));
        }

        Some(free)
    }

    /// Count free blocks in the volume bitmap
    pub fn free_blocks(&self) -> usize {
        self.block_bitmap()
            .map(|bits| bits.iter().filter(|&&free| free).count())
            .unwrap_or(0)
    }
}

impl<'a> FileSystem for ProdosFileSystem<'a> {
    fn list_files(&self) -> Vec<Box<dyn FileHandle + '_>> {
        self.entries()
            .into_iter()
            .map(|f| Box::new(f) as Box<dyn FileHandle + 'a>)
            .collect()
    }

    fn info(&self) -> FileSystemInfo {
        let header = self.volume_header();
        FileSystemInfo {
            fs_type: "ProDOS".to_string(),
            volume: header
                .as_ref()
                .map(|(name, _)| format!("/{}", name))
                .unwrap_or_else(|| "no volume header".to_string()),
            total_blocks: header
                .as_ref()
                .map(|(_, h)| h.total_blocks as usize)
                .unwrap_or(self.block_limit),
            free_blocks: self.free_blocks(),
            block_size: PRODOS_BLOCK_SIZE,
            file_count: self.entries().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(tag: u8, name: &str) -> [u8; PRODOS_ENTRY_SIZE] {
        let mut raw = [0u8; PRODOS_ENTRY_SIZE];
        raw[0] = (tag << 4) | name.len() as u8;
        raw[1..1 + name.len()].copy_from_slice(name.as_bytes());
        raw
    }

    fn file_slot(tag: u8, name: &str, key: u16, blocks_used: u16, eof: u32) -> [u8; PRODOS_ENTRY_SIZE] {
        let mut raw = slot(tag, name);
        raw[0x10] = 0x06;
        raw[0x11..0x13].copy_from_slice(&key.to_le_bytes());
        raw[0x13..0x15].copy_from_slice(&blocks_used.to_le_bytes());
        raw[0x15..0x18].copy_from_slice(&eof.to_le_bytes()[..3]);
        raw[0x1E] = 0xC3;
        raw[0x1F..0x21].copy_from_slice(&0x2000u16.to_le_bytes());
        raw
    }

    fn put_entry(image: &mut [u8], block: usize, index: usize, raw: &[u8]) {
        let offset = block * PRODOS_BLOCK_SIZE + PRODOS_DIRECTORY_ENTRY_OFFSET + index * PRODOS_ENTRY_SIZE;
        image[offset..offset + PRODOS_ENTRY_SIZE].copy_from_slice(raw);
    }

    fn set_next(image: &mut [u8], block: usize, next: u16) {
        let offset = block * PRODOS_BLOCK_SIZE + PRODOS_NEXT_BLOCK_OFFSET;
        image[offset..offset + 2].copy_from_slice(&next.to_le_bytes());
    }

    fn put_index(image: &mut [u8], block: usize, pointers: &[u16]) {
        let base = block * PRODOS_BLOCK_SIZE;
        for (i, p) in pointers.iter().enumerate() {
            image[base + i] = (*p & 0xFF) as u8;
            image[base + 256 + i] = (*p >> 8) as u8;
        }
    }

    fn fill_block(image: &mut [u8], block: usize, value: u8) {
        let base = block * PRODOS_BLOCK_SIZE;
        image[base..base + PRODOS_BLOCK_SIZE].fill(value);
    }

    #[test]
    fn test_storage_type_dispatch() {
        let cases = [
            (0x0, StorageType::Deleted),
            (0x1, StorageType::Seedling),
            (0x2, StorageType::Sapling),
            (0x3, StorageType::Tree),
            (0x4, StorageType::Pascal),
            (0x5, StorageType::GsosFork),
            (0xD, StorageType::Subdirectory),
            (0xE, StorageType::SubdirectoryHeader),
            (0xF, StorageType::VolumeHeader),
            (0x7, StorageType::Unknown(0x7)),
        ];
        for (tag, expected) in cases {
            let entry = ProdosEntry::decode(&slot(tag, "X")).unwrap();
            assert_eq!(entry.storage_type, expected);
            assert_eq!(entry.storage_type.nibble(), tag);
        }
    }

    #[test]
    fn test_entry_kinds() {
        let kind = |tag| ProdosEntry::decode(&slot(tag, "NAME")).unwrap().kind;
        assert!(matches!(kind(0x1), EntryKind::File(_)));
        assert!(matches!(kind(0x3), EntryKind::File(_)));
        assert!(matches!(kind(0xD), EntryKind::Subdirectory(_)));
        assert!(matches!(kind(0xE), EntryKind::SubdirectoryHeader(_)));
        assert!(matches!(kind(0xF), EntryKind::VolumeHeader(_)));
        assert_eq!(kind(0x0), EntryKind::Deleted);
        assert_eq!(kind(0x4), EntryKind::Pascal);
        assert_eq!(kind(0x5), EntryKind::GsosFork);
        assert_eq!(kind(0xC), EntryKind::Unknown);
    }

    #[test]
    fn test_unused_slots() {
        let mut raw = [0u8; PRODOS_ENTRY_SIZE];
        raw[0] = 0x10;
        assert!(ProdosEntry::decode(&raw).is_none());

        // Name of NULs only trims to nothing
        raw[0] = 0x13;
        assert!(ProdosEntry::decode(&raw).is_none());

        assert!(ProdosEntry::decode(&slot(1, "SHORT")[..20]).is_none());
    }

    #[test]
    fn test_name_decoding() {
        let mut raw = slot(1, "A");
        raw[0] = 0x15;
        raw[1..6].copy_from_slice(&[0, b'A', 0, b'B', 0]);
        assert_eq!(ProdosEntry::decode(&raw).unwrap().name, "A B");
    }

    #[test]
    fn test_file_fields() {
        let mut raw = file_slot(2, "PROGRAM", 0x1234, 3, 0x0104FF);
        raw[0x18..0x1C].copy_from_slice(&[0x61, 0x5A, 0x0E, 0x1F]);
        raw[0x25..0x27].copy_from_slice(&2u16.to_le_bytes());

        let entry = ProdosEntry::decode(&raw).unwrap();
        let fields = entry.file_fields().unwrap();
        assert_eq!(fields.file_type, 0x06);
        assert_eq!(fields.key_pointer, 0x1234);
        assert_eq!(fields.blocks_used, 3);
        assert_eq!(fields.eof, 0x0104FF);
        assert_eq!(fields.aux_type, 0x2000);
        assert_eq!(fields.header_pointer, 2);
        assert_eq!(entry.size(), 3 * 512);
        assert_eq!(entry.type_tag(), "32:6:8192");

        let file = ProdosFile::new(ProdosFileSystem::new(&[]), entry);
        assert_eq!(file.flags(), "11000011");
        assert_eq!(
            file.creation_time().unwrap(),
            "01100001010110100000111000011111"
        );
    }

    #[test]
    fn test_size_uses_blocks_not_eof() {
        let entry = ProdosEntry::decode(&file_slot(1, "TINY", 7, 1, 10)).unwrap();
        assert_eq!(entry.size(), 512);
        assert_eq!(entry.file_fields().unwrap().eof, 10);
    }

    #[test]
    fn test_header_fields() {
        let mut raw = slot(0xF, "VOLUME");
        raw[0x1E] = 0xC3;
        raw[0x1F] = 0x27;
        raw[0x20] = 0x0D;
        raw[0x21..0x23].copy_from_slice(&0x0102u16.to_le_bytes());
        raw[0x23..0x25].copy_from_slice(&6u16.to_le_bytes());
        raw[0x25..0x27].copy_from_slice(&280u16.to_le_bytes());

        let entry = ProdosEntry::decode(&raw).unwrap();
        match entry.kind {
            EntryKind::VolumeHeader(ref v) => {
                assert_eq!(v.entry_length, 0x27);
                assert_eq!(v.entries_per_block, 0x0D);
                assert_eq!(v.active_entries, 0x0102);
                assert_eq!(v.bitmap_pointer, 6);
                assert_eq!(v.total_blocks, 280);
            }
            ref other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.type_tag(), "240::");

        let mut raw = slot(0xE, "SUBDIR");
        raw[0x21..0x23].copy_from_slice(&5u16.to_le_bytes());
        raw[0x23..0x25].copy_from_slice(&2u16.to_le_bytes());
        raw[0x25] = 3;
        raw[0x26] = 0x27;
        match ProdosEntry::decode(&raw).unwrap().kind {
            EntryKind::SubdirectoryHeader(h) => {
                assert_eq!(h.active_entries, 5);
                assert_eq!(h.parent_pointer, 2);
                assert_eq!(h.parent_entry_number, 3);
                assert_eq!(h.parent_entry_length, 0x27);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_directory_walk_follows_chain() {
        let mut image = vec![0u8; 16 * PRODOS_BLOCK_SIZE];
        put_entry(&mut image, 2, 0, &slot(0xF, "VOL"));
        put_entry(&mut image, 2, 1, &file_slot(1, "ONE", 8, 1, 5));
        put_entry(&mut image, 2, 12, &file_slot(1, "LAST.SLOT", 8, 1, 5));
        set_next(&mut image, 2, 3);
        put_entry(&mut image, 3, 0, &file_slot(1, "TWO", 8, 1, 5));

        let fs = ProdosFileSystem::new(&image);
        let names: Vec<_> = fs.entries().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["VOL", "ONE", "LAST.SLOT", "TWO"]);
    }

    #[test]
    fn test_directory_cycle_terminates() {
        let mut image = vec![0u8; 8 * PRODOS_BLOCK_SIZE];
        put_entry(&mut image, 2, 0, &file_slot(1, "A", 5, 1, 1));
        set_next(&mut image, 2, 3);
        put_entry(&mut image, 3, 0, &file_slot(1, "B", 5, 1, 1));
        set_next(&mut image, 3, 2);

        let fs = ProdosFileSystem::new(&image);
        assert_eq!(fs.entries().len(), 2);
    }

    #[test]
    fn test_unknown_entries_skipped_in_listing() {
        let mut image = vec![0u8; 8 * PRODOS_BLOCK_SIZE];
        put_entry(&mut image, 2, 0, &slot(0x8, "ODD"));
        put_entry(&mut image, 2, 1, &file_slot(1, "GOOD", 5, 1, 1));

        let fs = ProdosFileSystem::new(&image);
        assert_eq!(fs.read_directory(2).len(), 2);
        let files = fs.entries();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name(), "GOOD");
    }

    #[test]
    fn test_seedling_content() {
        let mut image = vec![0u8; 8 * PRODOS_BLOCK_SIZE];
        fill_block(&mut image, 5, 0x41);
        let fs = ProdosFileSystem::new(&image);

        let entry = ProdosEntry::decode(&file_slot(1, "SEED", 5, 1, 100)).unwrap();
        let content = ProdosFile::new(fs, entry).content().unwrap();
        assert_eq!(content, vec![0x41; 100]);
    }

    #[test]
    fn test_sapling_content_with_sparse_block() {
        let mut image = vec![0u8; 16 * PRODOS_BLOCK_SIZE];
        put_index(&mut image, 6, &[7, 0, 8]);
        fill_block(&mut image, 7, 0x11);
        fill_block(&mut image, 8, 0x22);
        let fs = ProdosFileSystem::new(&image);

        let eof = 2 * 512 + 10;
        let entry = ProdosEntry::decode(&file_slot(2, "SAP", 6, 3, eof)).unwrap();
        let content = ProdosFile::new(fs, entry).content().unwrap();
        assert_eq!(content.len(), eof as usize);
        assert!(content[..512].iter().all(|&b| b == 0x11));
        assert!(content[512..1024].iter().all(|&b| b == 0));
        assert!(content[1024..].iter().all(|&b| b == 0x22));
    }

    #[test]
    fn test_tree_content() {
        let mut image = vec![0u8; 32 * PRODOS_BLOCK_SIZE];
        // Master index: first index block sparse, second real
        put_index(&mut image, 10, &[0, 11]);
        let mut pointers = vec![0u16; 256];
        pointers[0] = 12;
        put_index(&mut image, 11, &pointers);
        fill_block(&mut image, 12, 0x7E);
        let fs = ProdosFileSystem::new(&image);

        let eof = 256 * 512 + 300;
        let entry = ProdosEntry::decode(&file_slot(3, "TREE", 10, 3, eof)).unwrap();
        let content = ProdosFile::new(fs, entry).content().unwrap();
        assert_eq!(content.len(), eof as usize);
        assert!(content[..256 * 512].iter().all(|&b| b == 0));
        assert!(content[256 * 512..].iter().all(|&b| b == 0x7E));
    }

    #[test]
    fn test_content_unavailable() {
        let image = vec![0u8; 8 * PRODOS_BLOCK_SIZE];
        let fs = ProdosFileSystem::new(&image);

        // Key block past the end of the image
        let entry = ProdosEntry::decode(&file_slot(1, "GONE", 100, 1, 10)).unwrap();
        assert!(ProdosFile::new(fs, entry).content().is_none());

        // Zero key block
        let entry = ProdosEntry::decode(&file_slot(1, "NULL", 0, 1, 10)).unwrap();
        assert!(ProdosFile::new(fs, entry).content().is_none());

        // Not a file
        let entry = ProdosEntry::decode(&slot(0xF, "VOL")).unwrap();
        assert!(ProdosFile::new(fs, entry).content().is_none());
    }

    #[test]
    fn test_volume_header_limits_blocks() {
        let mut image = vec![0u8; 16 * PRODOS_BLOCK_SIZE];
        let mut header = slot(0xF, "SMALL");
        header[0x25..0x27].copy_from_slice(&8u16.to_le_bytes());
        put_entry(&mut image, 2, 0, &header);

        let fs = ProdosFileSystem::new(&image);
        assert_eq!(fs.block_count(), 8);
        assert!(fs.read_block(7).is_some());
        assert!(fs.read_block(8).is_none());
    }

    #[test]
    fn test_free_blocks_from_bitmap() {
        let mut image = vec![0u8; 16 * PRODOS_BLOCK_SIZE];
        let mut header = slot(0xF, "VOL");
        header[0x23..0x25].copy_from_slice(&6u16.to_le_bytes());
        header[0x25..0x27].copy_from_slice(&16u16.to_le_bytes());
        put_entry(&mut image, 2, 0, &header);
        // Blocks 8-15 free; bits past the volume end ignored
        image[6 * PRODOS_BLOCK_SIZE + 1] = 0xFF;
        image[6 * PRODOS_BLOCK_SIZE + 2] = 0xFF;

        let fs = ProdosFileSystem::new(&image);
        assert_eq!(fs.free_blocks(), 8);
        let info = fs.info();
        assert_eq!(info.volume, "/VOL");
        assert_eq!(info.total_blocks, 16);
    }

    #[test]
    fn test_read_subdirectory() {
        let mut image = vec![0u8; 16 * PRODOS_BLOCK_SIZE];
        put_entry(&mut image, 2, 0, &slot(0xF, "VOL"));
        put_entry(&mut image, 2, 1, &file_slot(0xD, "DOCS", 9, 1, 512));
        put_entry(&mut image, 9, 0, &slot(0xE, "DOCS"));
        put_entry(&mut image, 9, 1, &file_slot(1, "README", 10, 1, 4));

        let fs = ProdosFileSystem::new(&image);
        let docs = fs.find_file("docs").unwrap();
        let children = fs.read_subdirectory(docs.entry()).unwrap();
        let names: Vec<_> = children.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["DOCS", "README"]);

        let vol = &fs.entries()[0];
        assert_eq!(vol.storage_type(), StorageType::VolumeHeader);
        assert!(fs.read_subdirectory(vol.entry()).is_none());
        assert!(fs.find_file("VOL").is_none());
    }

    #[test]
    fn test_lookup_skips_volume_header() {
        let mut image = vec![0u8; 16 * PRODOS_BLOCK_SIZE];
        put_entry(&mut image, 2, 0, &slot(0xF, "PRODOS"));
        put_entry(&mut image, 2, 1, &file_slot(1, "PRODOS", 8, 1, 4));
        image[8 * PRODOS_BLOCK_SIZE..8 * PRODOS_BLOCK_SIZE + 4].copy_from_slice(b"DATA");

        let fs = ProdosFileSystem::new(&image);
        assert_eq!(fs.read_file("prodos").unwrap(), b"DATA");
        assert_eq!(fs.find_file("PRODOS").unwrap().storage_type(), StorageType::Seedling);
    }

    #[test]
    fn test_list_directory_named_like_volume() {
        let mut image = vec![0u8; 16 * PRODOS_BLOCK_SIZE];
        put_entry(&mut image, 2, 0, &slot(0xF, "GAMES"));
        put_entry(&mut image, 2, 1, &file_slot(0xD, "GAMES", 9, 1, 512));
        put_entry(&mut image, 9, 0, &slot(0xE, "GAMES"));
        put_entry(&mut image, 9, 1, &file_slot(1, "CHESS", 10, 1, 4));

        let fs = ProdosFileSystem::new(&image);
        let names: Vec<_> = fs
            .list_directory("games")
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["GAMES", "CHESS"]);

        assert_eq!(fs.find_file("GAMES").unwrap().storage_type(), StorageType::Subdirectory);
        assert!(matches!(fs.list_directory("CHESS"), Err(DiskError::FileNotFound(_))));
    }

    #[test]
    fn test_type_tag_matches_storage_byte() {
        let mut raw = file_slot(1, "SEED", 5, 1, 10);
        raw[0x1F..0x21].copy_from_slice(&0x2000u16.to_le_bytes());
        let entry = ProdosEntry::decode(&raw).unwrap();
        assert_eq!(entry.type_tag(), "16:6:8192");

        assert_eq!(ProdosEntry::decode(&slot(0xE, "DIR")).unwrap().type_tag(), "224::");
    }

    #[test]
    fn test_seedling_with_oversized_eof() {
        let mut image = vec![0u8; 8 * PRODOS_BLOCK_SIZE];
        image[5 * PRODOS_BLOCK_SIZE..6 * PRODOS_BLOCK_SIZE].fill(0x5A);
        let fs = ProdosFileSystem::new(&image);

        // A seedling holds one block whatever its EOF claims
        let entry = ProdosEntry::decode(&file_slot(1, "SEED", 5, 1, 0xFF_FFFF)).unwrap();
        let content = ProdosFile::new(fs, entry).content().unwrap();
        assert_eq!(content.len(), PRODOS_BLOCK_SIZE);
        assert!(content.iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_binary_string() {
        assert_eq!(binary_string(&[0x80, 0x01]), "1000000000000001");
        assert_eq!(binary_string(&[]), "");
    }
}
