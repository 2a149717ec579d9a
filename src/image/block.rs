/// ProDOS block addressing

use crate::format::{PRODOS_BLOCK_SIZE, PRODOS_INDEX_POINTERS, PRODOS_MAX_BLOCKS};

/// Read-only 512-byte block view over an image buffer
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    data: &'a [u8],
}

impl<'a> BlockView<'a> {
    /// Create a view over a buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of whole blocks in the buffer
    pub fn block_count(&self) -> usize {
        (self.data.len() / PRODOS_BLOCK_SIZE).min(PRODOS_MAX_BLOCKS)
    }

    /// Read a 512-byte block
    ///
    /// Returns `None` for a block number outside 0..65536 or a block that
    /// does not lie fully inside the buffer.
    pub fn read_block(&self, block: u32) -> Option<&'a [u8]> {
        if block as usize >= PRODOS_MAX_BLOCKS {
            return None;
        }

        let offset = block as usize * PRODOS_BLOCK_SIZE;
        self.data.get(offset..offset + PRODOS_BLOCK_SIZE)
    }

    /// Read an index block as 256 block pointers
    ///
    /// Index blocks hold the low bytes of each pointer in the first half
    /// and the high bytes in the second half.
    pub fn read_index_block(&self, block: u32) -> Option<[u16; PRODOS_INDEX_POINTERS]> {
        let data = self.read_block(block)?;
        let mut pointers = [0u16; PRODOS_INDEX_POINTERS];
        for (i, pointer) in pointers.iter_mut().enumerate() {
            *pointer = u16::from_le_bytes([data[i], data[PRODOS_INDEX_POINTERS + i]]);
        }
        Some(pointers)
    }
}
