/// Apple II image file reader

use crate::error::{DiskError, Result};
use crate::format::constants::*;
use crate::format::{is_two_img, DiskImageFormat};
use crate::image::DiskImage;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Read an image file from disk
///
/// Raw `.dsk`/`.do`/`.po`/`.hdv` files are loaded as-is. Files starting with
/// a 2IMG header have the header stripped and its image-format field decides
/// the layout, overriding the extension (so a DOS-order `.2mg` is DOS 3.3).
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<DiskImage> {
    let filename = path
        .as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string());

    let mut file = File::open(&path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    debug!(path = %path.as_ref().display(), bytes = data.len(), "read image file");

    let mut image = parse_image(data, DiskImageFormat::from_path(&path))?;
    image.filename = filename;
    Ok(image)
}

/// Build an image from file bytes, unwrapping a 2IMG container if present
pub fn parse_image(data: Vec<u8>, fallback: DiskImageFormat) -> Result<DiskImage> {
    if !is_two_img(&data) {
        return Ok(DiskImage::from_bytes(data, fallback));
    }

    let (format, range) = parse_two_img_header(&data)?;
    debug!(%format, offset = range.start, len = range.len(), "unwrapped 2IMG container");
    Ok(DiskImage::from_bytes(data[range].to_vec(), format))
}

/// Decode the 2IMG header fields this crate needs
fn parse_two_img_header(data: &[u8]) -> Result<(DiskImageFormat, std::ops::Range<usize>)> {
    let format = match read_u32_le(data, TWO_IMG_FORMAT_OFFSET) {
        0 => DiskImageFormat::Dos33,
        1 => DiskImageFormat::Prodos,
        other => {
            return Err(DiskError::invalid_format(format!(
                "Unsupported 2IMG image format {}",
                other
            )))
        }
    };

    let offset = read_u32_le(data, TWO_IMG_DATA_OFFSET_OFFSET) as usize;
    let length = read_u32_le(data, TWO_IMG_DATA_LENGTH_OFFSET) as usize;

    let end = offset
        .checked_add(length)
        .filter(|&end| offset >= TWO_IMG_HEADER_SIZE && end <= data.len())
        .ok_or_else(|| {
            DiskError::invalid_format(format!(
                "2IMG data range {}+{} outside file of {} bytes",
                offset,
                length,
                data.len()
            ))
        })?;

    Ok((format, offset..end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_img(format: u32, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; TWO_IMG_HEADER_SIZE];
        data[..4].copy_from_slice(TWO_IMG_SIGNATURE);
        data[TWO_IMG_FORMAT_OFFSET..TWO_IMG_FORMAT_OFFSET + 4]
            .copy_from_slice(&format.to_le_bytes());
        data[TWO_IMG_DATA_OFFSET_OFFSET..TWO_IMG_DATA_OFFSET_OFFSET + 4]
            .copy_from_slice(&(TWO_IMG_HEADER_SIZE as u32).to_le_bytes());
        data[TWO_IMG_DATA_LENGTH_OFFSET..TWO_IMG_DATA_LENGTH_OFFSET + 4]
            .copy_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_raw_image_uses_fallback() {
        let image = parse_image(vec![0; 1024], DiskImageFormat::Prodos).unwrap();
        assert_eq!(image.format(), DiskImageFormat::Prodos);
        assert_eq!(image.len(), 1024);
    }

    #[test]
    fn test_two_img_prodos() {
        let payload = vec![0x11u8; 1024];
        let image = parse_image(two_img(1, &payload), DiskImageFormat::Prodos).unwrap();
        assert_eq!(image.format(), DiskImageFormat::Prodos);
        assert_eq!(image.data(), payload.as_slice());
    }

    #[test]
    fn test_two_img_dos_order_overrides_extension() {
        let payload = vec![0u8; 512];
        let image = parse_image(two_img(0, &payload), DiskImageFormat::Prodos).unwrap();
        assert_eq!(image.format(), DiskImageFormat::Dos33);
    }

    #[test]
    fn test_two_img_nibble_rejected() {
        let result = parse_image(two_img(2, &[0u8; 512]), DiskImageFormat::Prodos);
        assert!(matches!(result, Err(DiskError::InvalidFormat(_))));
    }

    #[test]
    fn test_two_img_truncated_payload() {
        let mut data = two_img(1, &[0u8; 512]);
        data.truncate(TWO_IMG_HEADER_SIZE + 100);
        let result = parse_image(data, DiskImageFormat::Prodos);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_image_from_file() {
        let path = std::env::temp_dir().join(format!("a2disk-reader-{}.po", std::process::id()));
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let image = read_image(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(image.format(), DiskImageFormat::Prodos);
        assert_eq!(image.len(), 2048);
        assert!(image.filename().unwrap().ends_with(".po"));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_image("/nonexistent/path/disk.dsk");
        assert!(matches!(result, Err(DiskError::Io(_))));
    }
}
