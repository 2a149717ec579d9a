/// Free-space map visualization

use crate::filesystem::{ProdosFileSystem, Vtoc};
use crate::format::DOS_TRACKS_PER_DISK;
use std::fmt::Write;

/// ANSI color codes for the free-space maps
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT_WHITE: &str = "\x1b[97m";
    pub const DARK_WHITE: &str = "\x1b[37m";
}

const BLOCK_FREE: &str = "\u{2591}"; // ░ - Light shade (free)
const BLOCK_USED: &str = "\u{2593}"; // ▓ - Dark shade (in-use)

/// Blocks drawn per row of the ProDOS map
const BLOCKS_PER_ROW: usize = 64;

fn cell(out: &mut String, free: bool) {
    let (color, block) = if free {
        (colors::DARK_WHITE, BLOCK_FREE)
    } else {
        (colors::BRIGHT_WHITE, BLOCK_USED)
    };
    let _ = write!(out, "{}{}{}", color, block, colors::RESET);
}

/// Render the VTOC free-sector bitmap, one column per track
///
/// The VTOC keeps one bitmap byte per track, so only sectors 0-7 are drawn.
pub fn render_free_sector_map(vtoc: &Vtoc) -> String {
    let mut out = String::new();
    let num_tracks = DOS_TRACKS_PER_DISK as usize;

    let _ = writeln!(out, "=== Free Sector Map (Volume {}) ===", vtoc.volume_number);
    let _ = writeln!(
        out,
        "Legend: {}In Use{} {}Free{}",
        colors::BRIGHT_WHITE,
        colors::RESET,
        colors::DARK_WHITE,
        colors::RESET
    );
    let _ = writeln!(out);

    // Sector 0 at the bottom
    for sector in (0..8u8).rev() {
        let _ = write!(out, "{:>2} ", sector);
        for track in 0..num_tracks {
            cell(&mut out, vtoc.is_sector_free(track as u8, sector));
        }
        let _ = writeln!(out);
    }

    // Track axis, labels every five columns
    out.push_str("   ");
    let mut printed_cols = vec![false; num_tracks];
    for track in 0..num_tracks {
        if track % 5 == 0 && !printed_cols[track] {
            for (i, digit) in track.to_string().chars().enumerate() {
                let col = track + i;
                if col < num_tracks {
                    out.push(digit);
                    printed_cols[col] = true;
                }
            }
        } else if !printed_cols[track] {
            out.push(' ');
        }
    }
    out.push('\n');

    let _ = writeln!(out, "Free sectors: {}", vtoc.bitmap_free_sectors());
    out
}

/// Render the ProDOS volume bitmap, 64 blocks per row
///
/// Returns `None` when the volume has no readable header.
pub fn render_block_map(volume: &ProdosFileSystem<'_>) -> Option<String> {
    let bitmap = volume.block_bitmap()?;
    let mut out = String::new();

    let _ = writeln!(out, "=== Block Map ({} blocks) ===", bitmap.len());
    let _ = writeln!(
        out,
        "Legend: {}In Use{} {}Free{}",
        colors::BRIGHT_WHITE,
        colors::RESET,
        colors::DARK_WHITE,
        colors::RESET
    );
    let _ = writeln!(out);

    for (row, chunk) in bitmap.chunks(BLOCKS_PER_ROW).enumerate() {
        let _ = write!(out, "{:>5} ", row * BLOCKS_PER_ROW);
        for &free in chunk {
            cell(&mut out, free);
        }
        let _ = writeln!(out);
    }

    let free = bitmap.iter().filter(|&&f| f).count();
    let _ = writeln!(out, "Free blocks: {}", free);
    Some(out)
}
