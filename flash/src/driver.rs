//! Driver contract between a flash filesystem and its medium.
//!
//! The filesystem never touches flash directly: it is handed an
//! [`Attached`] driver at mount time and calls the six operations of
//! [`FlashDriver`] on it.

use crate::error::FlashResult;
use crate::geometry::Geometry;
use crate::tags::TagRecord;

// ============================================================================
// Block State
// ============================================================================

/// Classification of a block from the tag of its first chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockState {
    /// Block is retired
    Dead = 0,
    /// Nothing written since erase
    Empty = 1,
    /// Holds data; must be replayed during scan
    NeedsScan = 2,
}

impl BlockState {
    /// Classify a tag. The bad flag dominates every other field.
    pub const fn classify(tag: &TagRecord) -> BlockInfo {
        if tag.block_bad {
            BlockInfo { state: Self::Dead, sequence_number: 0 }
        } else if !tag.chunk_used {
            BlockInfo { state: Self::Empty, sequence_number: 0 }
        } else {
            BlockInfo { state: Self::NeedsScan, sequence_number: tag.sequence_number }
        }
    }
}

/// Result of a block query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block state
    pub state: BlockState,
    /// Sequence number, zero unless `NeedsScan`
    pub sequence_number: u32,
}

// ============================================================================
// Driver Trait
// ============================================================================

/// Operations a flash filesystem requires from its medium.
pub trait FlashDriver {
    /// Layout the driver was built for
    fn geometry(&self) -> &Geometry;

    /// Read the data and/or tags of one chunk. Omitted outputs are not
    /// touched on the medium.
    fn read_chunk(
        &mut self,
        chunk: u32,
        data: Option<&mut [u8]>,
        tags: Option<&mut TagRecord>,
    ) -> FlashResult<()>;

    /// Write the data and/or tags of one chunk. Omitting data is a
    /// tags-only update.
    fn write_chunk(
        &mut self,
        chunk: u32,
        data: Option<&[u8]>,
        tags: Option<&TagRecord>,
    ) -> FlashResult<()>;

    /// Classify a block from its first chunk's tag.
    fn query_block(&mut self, block: u32) -> FlashResult<BlockInfo>;

    /// Set the bad flag on a block, leaving data untouched.
    fn mark_bad(&mut self, block: u32) -> FlashResult<()>;

    /// Erase a block.
    fn erase(&mut self, block: u32) -> FlashResult<()>;

    /// Bring up the medium. Idempotent.
    fn initialise(&mut self) -> FlashResult<()>;
}

// ============================================================================
// Device Parameters
// ============================================================================

/// Parameter block handed to the filesystem with the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceParams {
    /// Device name
    pub name: &'static str,
    /// Payload bytes per chunk
    pub bytes_per_chunk: u32,
    /// Tag bytes per chunk
    pub spare_bytes_per_chunk: u32,
    /// Chunks per block
    pub chunks_per_block: u32,
    /// First usable block
    pub start_block: u32,
    /// Last usable block (inclusive)
    pub end_block: u32,
    /// Blocks kept free for garbage collection
    pub reserved_blocks: u32,
    /// Tags live in the chunk rather than a separate spare area
    pub inband_tags: bool,
}

impl DeviceParams {
    /// Parameters describing the whole device
    pub const fn from_geometry(name: &'static str, geometry: &Geometry) -> Self {
        Self {
            name,
            bytes_per_chunk: geometry.data_size(),
            spare_bytes_per_chunk: geometry.tag_size(),
            chunks_per_block: geometry.chunks_per_block(),
            start_block: 0,
            end_block: geometry.block_count().saturating_sub(1),
            reserved_blocks: geometry.reserved_blocks(),
            inband_tags: true,
        }
    }

    /// Number of usable blocks
    #[inline]
    pub const fn block_count(&self) -> u32 {
        self.end_block - self.start_block + 1
    }
}

// ============================================================================
// Attached Driver
// ============================================================================

/// A driver that has been initialised and is ready for the filesystem.
#[derive(Debug)]
pub struct Attached<D> {
    /// Injected driver
    driver: D,
    /// Parameters the filesystem mounts with
    params: DeviceParams,
}

impl<D: FlashDriver> Attached<D> {
    /// Initialise `driver` and describe it under `name`.
    pub fn attach(name: &'static str, mut driver: D) -> FlashResult<Self> {
        driver.initialise()?;
        let params = DeviceParams::from_geometry(name, driver.geometry());
        log::info!(
            "flash device '{}' attached: blocks {}..={} ({} reserved), {}+{} byte chunks",
            params.name,
            params.start_block,
            params.end_block,
            params.reserved_blocks,
            params.bytes_per_chunk,
            params.spare_bytes_per_chunk,
        );
        Ok(Self { driver, params })
    }

    /// Mount parameters
    #[inline]
    pub fn params(&self) -> &DeviceParams {
        &self.params
    }

    /// Driver, for filesystem callbacks
    #[inline]
    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Detach and return the driver
    pub fn into_inner(self) -> D {
        self.driver
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_precedence() {
        for used in [false, true] {
            for seq in [0, 7, u32::MAX] {
                let tag = TagRecord { sequence_number: seq, chunk_used: used, block_bad: true };
                assert_eq!(BlockState::classify(&tag), BlockInfo { state: BlockState::Dead, sequence_number: 0 });
            }
        }

        let empty = BlockState::classify(&TagRecord::ERASED);
        assert_eq!(empty, BlockInfo { state: BlockState::Empty, sequence_number: 0 });

        let live = BlockState::classify(&TagRecord::used(99));
        assert_eq!(live, BlockInfo { state: BlockState::NeedsScan, sequence_number: 99 });
    }

    #[test]
    fn test_params_from_geometry() {
        let params = DeviceParams::from_geometry("flash", &Geometry::DEFAULT);
        assert_eq!(params.bytes_per_chunk, 512);
        assert_eq!(params.spare_bytes_per_chunk, 16);
        assert_eq!(params.chunks_per_block, 248);
        assert_eq!(params.end_block, 255);
        assert_eq!(params.block_count(), 256);
        assert_eq!(params.reserved_blocks, 5);
        assert!(params.inband_tags);
    }

    #[test]
    fn test_params_single_block() {
        let g = Geometry::new(4 * 48, 32, 16, 4, 0).unwrap();
        let params = DeviceParams::from_geometry("tiny", &g);
        assert_eq!(params.start_block, 0);
        assert_eq!(params.end_block, 0);
        assert_eq!(params.block_count(), 1);
    }
}
