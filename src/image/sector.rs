/// DOS 3.3 track/sector addressing

use crate::format::{DOS_BYTES_PER_SECTOR, DOS_SECTORS_PER_TRACK, DOS_TRACKS_PER_DISK};

/// Track/sector address of a 256-byte DOS sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackSector {
    /// Track number (0-34)
    pub track: u8,
    /// Sector number (0-15)
    pub sector: u8,
}

impl TrackSector {
    /// Create a new address
    pub fn new(track: u8, sector: u8) -> Self {
        Self { track, sector }
    }

    /// Check the address against the fixed 35 x 16 geometry
    pub fn is_valid(&self) -> bool {
        self.track < DOS_TRACKS_PER_DISK && self.sector < DOS_SECTORS_PER_TRACK
    }

    /// Byte offset of this sector inside the image
    pub fn offset(&self) -> usize {
        (self.track as usize * DOS_SECTORS_PER_TRACK as usize + self.sector as usize)
            * DOS_BYTES_PER_SECTOR
    }
}

impl std::fmt::Display for TrackSector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{:02}/S{:02}", self.track, self.sector)
    }
}

/// Read-only track/sector view over an image buffer
#[derive(Debug, Clone, Copy)]
pub struct SectorView<'a> {
    data: &'a [u8],
}

impl<'a> SectorView<'a> {
    /// Create a view over a buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Read a 256-byte sector
    ///
    /// Returns `None` for a track outside 0..35, a sector outside 0..16, or a
    /// sector that does not lie fully inside the buffer.
    pub fn read_sector(&self, track: u8, sector: u8) -> Option<&'a [u8]> {
        self.read(TrackSector::new(track, sector))
    }

    /// Read a 256-byte sector by address
    pub fn read(&self, address: TrackSector) -> Option<&'a [u8]> {
        if !address.is_valid() {
            return None;
        }

        let offset = address.offset();
        self.data.get(offset..offset + DOS_BYTES_PER_SECTOR)
    }

    /// Get the underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DOS_IMAGE_SIZE;

    fn numbered_image() -> Vec<u8> {
        let mut data = vec![0u8; DOS_IMAGE_SIZE];
        for (i, chunk) in data.chunks_mut(DOS_BYTES_PER_SECTOR).enumerate() {
            chunk[0] = (i / 16) as u8;
            chunk[1] = (i % 16) as u8;
        }
        data
    }

    #[test]
    fn test_read_sector_offset() {
        let data = numbered_image();
        let view = SectorView::new(&data);

        let sector = view.read_sector(17, 0).unwrap();
        assert_eq!(sector.len(), 256);
        assert_eq!(&sector[..2], &[17, 0]);

        let sector = view.read_sector(34, 15).unwrap();
        assert_eq!(&sector[..2], &[34, 15]);
    }

    #[test]
    fn test_read_sector_out_of_range() {
        let data = numbered_image();
        let view = SectorView::new(&data);

        assert!(view.read_sector(35, 0).is_none());
        assert!(view.read_sector(0, 16).is_none());
        assert!(view.read_sector(255, 255).is_none());
    }

    #[test]
    fn test_read_sector_short_buffer() {
        let data = vec![0u8; 1000];
        let view = SectorView::new(&data);

        assert!(view.read_sector(0, 2).is_some());
        assert!(view.read_sector(0, 3).is_none());
        assert!(SectorView::new(&[]).read_sector(0, 0).is_none());
    }

    #[test]
    fn test_track_sector_display() {
        assert_eq!(TrackSector::new(17, 15).to_string(), "T17/S15");
    }
}
