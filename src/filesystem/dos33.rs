/// Apple DOS 3.3 filesystem implementation
///
/// Layout of a 140K DOS 3.3 disk:
/// - 35 tracks of 16 sectors, 256 bytes each
/// - VTOC at track 17, sector 0 pointing at the first catalog sector
/// - Catalog sectors linked by (track, sector), seven 35-byte entries each
/// - Each file has a chain of Track/Sector list sectors naming its data sectors

use crate::filesystem::{ChainGuard, FileHandle, FileSystem, FileSystemInfo};
use crate::format::constants::*;
use crate::image::sector::{SectorView, TrackSector};
use crate::image::DiskImage;
use tracing::{debug, warn};

/// Volume Table Of Contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vtoc {
    /// DOS release that formatted the disk
    pub dos_version: u8,
    /// Volume number (usually 254)
    pub volume_number: u8,
    /// Declared tracks per disk
    pub tracks_per_disk: u8,
    /// Declared sectors per track
    pub sectors_per_track: u8,
    /// Declared bytes per sector
    pub bytes_per_sector: u16,
    /// First catalog sector
    pub first_catalog: TrackSector,
    /// Free-sector count field
    pub free_sector_count: u16,
    /// Free-sector bitmap, one byte per track, bit n set = sector n free
    pub free_sector_bitmap: [u8; DOS_TRACKS_PER_DISK as usize],
}

impl Vtoc {
    /// Parse a VTOC sector
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DOS_BYTES_PER_SECTOR {
            return None;
        }

        let mut free_sector_bitmap = [0u8; DOS_TRACKS_PER_DISK as usize];
        free_sector_bitmap.copy_from_slice(
            &data[DOS_VTOC_BITMAP_OFFSET..DOS_VTOC_BITMAP_OFFSET + DOS_TRACKS_PER_DISK as usize],
        );

        Some(Self {
            dos_version: data[0x03],
            volume_number: data[0x06],
            tracks_per_disk: data[0x34],
            sectors_per_track: data[0x35],
            bytes_per_sector: read_u16_le(data, 0x36),
            first_catalog: TrackSector::new(data[0x01], data[0x02]),
            free_sector_count: read_u16_le(data, 0x31),
            free_sector_bitmap,
        })
    }

    /// Check the bitmap for a free sector
    ///
    /// Only sectors 0-7 of each track are covered by the one-byte-per-track
    /// map; higher sectors report as in use.
    pub fn is_sector_free(&self, track: u8, sector: u8) -> bool {
        match self.free_sector_bitmap.get(track as usize) {
            Some(byte) if sector < 8 => byte & (1 << sector) != 0,
            _ => false,
        }
    }

    /// Count free sectors in the bitmap
    pub fn bitmap_free_sectors(&self) -> usize {
        self.free_sector_bitmap
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum()
    }
}

/// DOS 3.3 file types (low 7 bits of the type byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosFileType {
    /// Text file (0x00)
    Text,
    /// Integer BASIC program (0x01)
    IntegerBasic,
    /// Applesoft BASIC program (0x02)
    Applesoft,
    /// Binary file (0x04)
    Binary,
    /// S type file (0x08)
    SType,
    /// Relocatable object module (0x10)
    Relocatable,
    /// New A type file (0x20)
    NewA,
    /// New B type file (0x40)
    NewB,
    /// Any other combination of bits
    Other(u8),
}

impl DosFileType {
    /// Parse the type from a catalog type byte, ignoring the lock bit
    pub fn from_byte(byte: u8) -> Self {
        match byte & 0x7F {
            0x00 => DosFileType::Text,
            0x01 => DosFileType::IntegerBasic,
            0x02 => DosFileType::Applesoft,
            0x04 => DosFileType::Binary,
            0x08 => DosFileType::SType,
            0x10 => DosFileType::Relocatable,
            0x20 => DosFileType::NewA,
            0x40 => DosFileType::NewB,
            other => DosFileType::Other(other),
        }
    }

    /// Get type code
    pub fn type_code(&self) -> u8 {
        match self {
            DosFileType::Text => 0x00,
            DosFileType::IntegerBasic => 0x01,
            DosFileType::Applesoft => 0x02,
            DosFileType::Binary => 0x04,
            DosFileType::SType => 0x08,
            DosFileType::Relocatable => 0x10,
            DosFileType::NewA => 0x20,
            DosFileType::NewB => 0x40,
            DosFileType::Other(code) => *code,
        }
    }
}

impl std::fmt::Display for DosFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DosFileType::Text => write!(f, "T"),
            DosFileType::IntegerBasic => write!(f, "I"),
            DosFileType::Applesoft => write!(f, "A"),
            DosFileType::Binary => write!(f, "B"),
            DosFileType::SType => write!(f, "S"),
            DosFileType::Relocatable => write!(f, "R"),
            DosFileType::NewA => write!(f, "a"),
            DosFileType::NewB => write!(f, "b"),
            DosFileType::Other(code) => write!(f, "?{:02X}", code),
        }
    }
}

/// Catalog entry (35 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DosCatalogEntry {
    /// First Track/Sector list sector
    pub ts_list: TrackSector,
    /// Combined type and lock byte
    pub type_byte: u8,
    /// File name
    pub name: String,
    /// Sectors used, including T/S list sectors
    pub sector_count: u16,
    /// Raw slot bytes
    pub raw: [u8; DOS_CATALOG_ENTRY_SIZE],
}

impl DosCatalogEntry {
    /// Parse a catalog entry from a 35-byte slot
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DOS_CATALOG_ENTRY_SIZE {
            return None;
        }

        let mut raw = [0u8; DOS_CATALOG_ENTRY_SIZE];
        raw.copy_from_slice(&data[..DOS_CATALOG_ENTRY_SIZE]);

        Some(Self {
            ts_list: TrackSector::new(data[0x00], data[0x01]),
            type_byte: data[0x02],
            name: decode_name(&data[0x03..0x13]),
            sector_count: read_u16_le(data, 0x21),
            raw,
        })
    }

    /// Never-used (track 0) and deleted (track 255) slots
    pub fn is_placeholder(&self) -> bool {
        self.ts_list.track == 0 || self.ts_list.track == 0xFF
    }

    /// Allocated size; DOS keeps no byte length
    pub fn size(&self) -> usize {
        self.sector_count as usize * DOS_BYTES_PER_SECTOR
    }

    /// Lock bit
    pub fn locked(&self) -> bool {
        self.type_byte & 0x80 != 0
    }

    /// File type without the lock bit
    pub fn file_type(&self) -> DosFileType {
        DosFileType::from_byte(self.type_byte)
    }
}

/// Decode a DOS name: high bit dropped, 0xA0 padding to space, trimmed
fn decode_name(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b == 0xA0 { ' ' } else { (b & 0x7F) as char })
        .collect::<String>()
        .trim()
        .to_string()
}

/// One catalog sector: link plus its seven entry slots
#[derive(Debug, Clone)]
pub struct CatalogSector {
    /// Next catalog sector (track 0 ends the chain)
    pub next: TrackSector,
    /// All seven slots, placeholders included
    pub entries: Vec<DosCatalogEntry>,
}

impl CatalogSector {
    /// Parse a 256-byte catalog sector
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DOS_BYTES_PER_SECTOR {
            return None;
        }

        let entries = (0..DOS_CATALOG_ENTRIES_PER_SECTOR)
            .filter_map(|i| {
                let offset = DOS_CATALOG_ENTRY_OFFSET + i * DOS_CATALOG_ENTRY_SIZE;
                data.get(offset..).and_then(DosCatalogEntry::parse)
            })
            .collect();

        Some(Self {
            next: TrackSector::new(data[DOS_NEXT_TRACK_OFFSET], data[DOS_NEXT_SECTOR_OFFSET]),
            entries,
        })
    }
}

/// A file listed in the catalog
#[derive(Debug, Clone)]
pub struct DosFile<'a> {
    sectors: SectorView<'a>,
    entry: DosCatalogEntry,
    type_tag: String,
    flags: String,
}

impl<'a> DosFile<'a> {
    fn new(sectors: SectorView<'a>, entry: DosCatalogEntry) -> Self {
        // Type and flags both show the raw byte, lock bit included
        let type_tag = format!("{:02x}", entry.type_byte);
        let flags = type_tag.clone();
        Self {
            sectors,
            entry,
            type_tag,
            flags,
        }
    }

    /// Get the decoded catalog entry
    pub fn entry(&self) -> &DosCatalogEntry {
        &self.entry
    }

    /// Check the lock bit
    pub fn locked(&self) -> bool {
        self.entry.locked()
    }

    /// Get the typed file type
    pub fn dos_file_type(&self) -> DosFileType {
        self.entry.file_type()
    }
}

impl FileHandle for DosFile<'_> {
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
        read_ts_chain(self.sectors, self.entry.ts_list)
    }
}

/// Concatenate the data sectors named by a T/S list chain
///
/// Each list sector holds up to 122 (track, sector) pairs from offset 0x0C;
/// a pair with track 0 ends the file. When all 122 pairs are used the next
/// list sector is taken from offsets 0x01/0x02. Returns `None` only if the
/// first list sector cannot be read.
fn read_ts_chain(sectors: SectorView<'_>, first: TrackSector) -> Option<Vec<u8>> {
    let mut guard = ChainGuard::new("dos t/s list");
    let mut data = Vec::new();
    let mut current = first;

    loop {
        if !guard.visit(current) {
            break;
        }

        let list = match sectors.read(current) {
            Some(list) => list,
            None if current == first => return None,
            None => {
                warn!(sector = %current, "unreadable T/S list sector, truncating file");
                break;
            }
        };

        for i in 0..DOS_TS_LIST_MAX_PAIRS {
            let offset = DOS_TS_LIST_PAIRS_OFFSET + i * 2;
            let pair = TrackSector::new(list[offset], list[offset + 1]);
            if pair.track == 0 {
                return Some(data);
            }

            match sectors.read(pair) {
                Some(sector) => data.extend_from_slice(sector),
                None => warn!(sector = %pair, "skipping unreadable data sector"),
            }
        }

        let next = TrackSector::new(list[DOS_NEXT_TRACK_OFFSET], list[DOS_NEXT_SECTOR_OFFSET]);
        if next.track == 0 {
            break;
        }
        debug!(from = %current, to = %next, "following T/S list chain");
        current = next;
    }

    Some(data)
}

/// DOS 3.3 filesystem over a 143,360-byte image
#[derive(Debug, Clone, Copy)]
pub struct Dos33FileSystem<'a> {
    sectors: SectorView<'a>,
}

impl<'a> Dos33FileSystem<'a> {
    /// Create a filesystem over a raw buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            sectors: SectorView::new(data),
        }
    }

    /// Create a filesystem over an image
    pub fn from_image(image: &'a DiskImage) -> Self {
        Self::new(image.data())
    }

    /// Read a 256-byte sector
    pub fn read_sector(&self, track: u8, sector: u8) -> Option<&'a [u8]> {
        self.sectors.read_sector(track, sector)
    }

    /// Read the VTOC at track 17, sector 0
    pub fn read_vtoc(&self) -> Option<Vtoc> {
        self.sectors
            .read_sector(DOS_VTOC_TRACK, DOS_VTOC_SECTOR)
            .and_then(Vtoc::parse)
    }

    /// Read and parse one catalog sector
    pub fn read_catalog_sector(&self, address: TrackSector) -> Option<CatalogSector> {
        self.sectors.read(address).and_then(CatalogSector::parse)
    }

    /// List every live catalog entry in on-disk order
    pub fn catalog(&self) -> Vec<DosFile<'a>> {
        debug!("listing DOS 3.3 catalog");
        match self.read_vtoc() {
            Some(vtoc) => self.read_catalog(vtoc.first_catalog),
            None => Vec::new(),
        }
    }

    /// Walk the catalog chain from a given sector
    ///
    /// Stops at a track-0 link, an unreadable sector or a revisited sector,
    /// keeping whatever entries were collected.
    pub fn read_catalog(&self, first: TrackSector) -> Vec<DosFile<'a>> {
        let mut guard = ChainGuard::new("dos catalog");
        let mut files = Vec::new();
        let mut current = first;

        while current.track != 0 {
            if !guard.visit(current) {
                break;
            }

            let catalog_sector = match self.read_catalog_sector(current) {
                Some(s) => s,
                None => {
                    debug!(sector = %current, "catalog sector unreadable, stopping");
                    break;
                }
            };

            files.extend(
                catalog_sector
                    .entries
                    .into_iter()
                    .filter(|e| !e.is_placeholder())
                    .map(|e| DosFile::new(self.sectors, e)),
            );

            current = catalog_sector.next;
        }

        files
    }

    /// Find a file by name (case-insensitive)
    pub fn find_file(&self, name: &str) -> Option<DosFile<'a>> {
        self.catalog()
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }
}

impl<'a> FileSystem for Dos33FileSystem<'a> {
    fn list_files(&self) -> Vec<Box<dyn FileHandle + '_>> {
        self.catalog()
            .into_iter()
            .map(|f| Box::new(f) as Box<dyn FileHandle + 'a>)
            .collect()
    }

    fn info(&self) -> FileSystemInfo {
        let vtoc = self.read_vtoc();
        FileSystemInfo {
            fs_type: "DOS 3.3".to_string(),
            volume: vtoc
                .as_ref()
                .map(|v| format!("Volume {}", v.volume_number))
                .unwrap_or_else(|| "no VTOC".to_string()),
            total_blocks: DOS_TRACKS_PER_DISK as usize * DOS_SECTORS_PER_TRACK as usize,
            free_blocks: vtoc.as_ref().map(|v| v.bitmap_free_sectors()).unwrap_or(0),
            block_size: DOS_BYTES_PER_SECTOR,
            file_count: self.catalog().len(),
        }
    }
}
