//! Device geometry and chunk addressing.
//!
//! The device is a flat run of blocks; each block is a run of chunks and
//! each chunk is a data region immediately followed by its tag region:
//!
//! ```text
//! block 0                                  block 1
//! ┌──────────┬─────┬──────────┬─────┬─────┬──────────┬─────┬───
//! │ data 0   │ tag │ data 1   │ tag │ ... │ data 0   │ tag │ ...
//! └──────────┴─────┴──────────┴─────┴─────┴──────────┴─────┴───
//! ```

use crate::error::{FlashError, FlashResult};
use crate::tags::TagRecord;
use static_assertions::const_assert;

// ============================================================================
// Geometry
// ============================================================================

/// Immutable layout of the flash device.
///
/// Only obtainable through [`Geometry::new`] or [`Geometry::DEFAULT`], so
/// every value has at least one block beyond the reserved ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Total device size in bytes
    device_size: u32,
    /// Bytes per block (`chunks_per_block * chunk_size`)
    block_size: u32,
    /// Payload bytes per chunk
    data_size: u32,
    /// Out-of-band bytes per chunk
    tag_size: u32,
    /// Bytes per chunk (`data_size + tag_size`)
    chunk_size: u32,
    /// Chunks per block
    chunks_per_block: u32,
    /// Blocks kept back by the filesystem for garbage collection
    reserved_blocks: u32,
}

impl Geometry {
    /// 32 MiB NOR part, 128 KiB erase sectors, 512 + 16 byte chunks.
    pub const DEFAULT: Self = Self::derive(32 * 1024 * 1024, 512, 16, 248, 5);

    /// Compute derived sizes without validation.
    const fn derive(
        device_size: u32,
        data_size: u32,
        tag_size: u32,
        chunks_per_block: u32,
        reserved_blocks: u32,
    ) -> Self {
        let chunk_size = data_size + tag_size;
        Self {
            device_size,
            block_size: chunks_per_block * chunk_size,
            data_size,
            tag_size,
            chunk_size,
            chunks_per_block,
            reserved_blocks,
        }
    }

    /// Build and validate a geometry.
    pub fn new(
        device_size: u32,
        data_size: u32,
        tag_size: u32,
        chunks_per_block: u32,
        reserved_blocks: u32,
    ) -> FlashResult<Self> {
        if data_size == 0 || chunks_per_block == 0 {
            return Err(FlashError::InvalidGeometry);
        }
        if (tag_size as usize) < TagRecord::SIZE {
            return Err(FlashError::InvalidGeometry);
        }
        let block_size = (data_size as u64 + tag_size as u64) * chunks_per_block as u64;
        if block_size > u32::MAX as u64 {
            return Err(FlashError::InvalidGeometry);
        }

        let geometry = Self::derive(device_size, data_size, tag_size, chunks_per_block, reserved_blocks);
        if geometry.block_count() <= reserved_blocks {
            return Err(FlashError::InvalidGeometry);
        }
        Ok(geometry)
    }

    /// Total device size in bytes
    #[inline]
    pub const fn device_size(&self) -> u32 {
        self.device_size
    }

    /// Bytes per block
    #[inline]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Payload bytes per chunk
    #[inline]
    pub const fn data_size(&self) -> u32 {
        self.data_size
    }

    /// Tag bytes per chunk
    #[inline]
    pub const fn tag_size(&self) -> u32 {
        self.tag_size
    }

    /// Bytes per chunk
    #[inline]
    pub const fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Chunks per block
    #[inline]
    pub const fn chunks_per_block(&self) -> u32 {
        self.chunks_per_block
    }

    /// Blocks kept back for garbage collection
    #[inline]
    pub const fn reserved_blocks(&self) -> u32 {
        self.reserved_blocks
    }

    /// Number of whole blocks on the device
    #[inline]
    pub const fn block_count(&self) -> u32 {
        self.device_size / self.block_size
    }

    /// Number of chunks on the device
    #[inline]
    pub const fn chunk_count(&self) -> u32 {
        self.block_count() * self.chunks_per_block
    }

    /// Bytes actually covered by blocks
    #[inline]
    pub const fn used_size(&self) -> u32 {
        self.block_count() * self.block_size
    }

    /// Byte offset of a chunk inside the device.
    ///
    /// Indices must be within the configured bounds.
    #[inline]
    pub fn address(&self, block: u32, chunk_in_block: u32) -> usize {
        debug_assert!(block < self.block_count(), "block {} out of range", block);
        debug_assert!(chunk_in_block < self.chunks_per_block, "chunk {} out of range", chunk_in_block);
        block as usize * self.block_size as usize + chunk_in_block as usize * self.chunk_size as usize
    }

    /// Split a flat chunk index into its block address.
    #[inline]
    pub const fn locate(&self, chunk: u32) -> ChunkAddr {
        ChunkAddr {
            block: chunk / self.chunks_per_block,
            chunk: chunk % self.chunks_per_block,
        }
    }

    /// Byte offset of a flat chunk index
    #[inline]
    pub fn chunk_offset(&self, chunk: u32) -> usize {
        let addr = self.locate(chunk);
        self.address(addr.block, addr.chunk)
    }

    /// Byte offset of a chunk's tag region
    #[inline]
    pub fn tag_offset(&self, chunk: u32) -> usize {
        self.chunk_offset(chunk) + self.data_size as usize
    }

    /// First flat chunk index of a block
    #[inline]
    pub const fn first_chunk(&self, block: u32) -> u32 {
        block * self.chunks_per_block
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const_assert!(Geometry::DEFAULT.chunk_size == Geometry::DEFAULT.data_size + Geometry::DEFAULT.tag_size);
const_assert!(Geometry::DEFAULT.block_size == Geometry::DEFAULT.chunks_per_block * Geometry::DEFAULT.chunk_size);
const_assert!(Geometry::DEFAULT.block_size <= 128 * 1024);
const_assert!(Geometry::DEFAULT.tag_size as usize >= TagRecord::SIZE);
const_assert!(Geometry::DEFAULT.block_count() > Geometry::DEFAULT.reserved_blocks);

// ============================================================================
// Chunk Address
// ============================================================================

/// Chunk position expressed as block plus chunk within the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkAddr {
    /// Block number
    pub block: u32,
    /// Chunk within the block
    pub chunk: u32,
}

// ============================================================================
// Tests
// ============================================================================
