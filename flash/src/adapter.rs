//! Flash device adapter.
//!
//! Implements [`FlashDriver`] on top of a [`NorMedium`]: every operation
//! turns a chunk or block number into byte offsets with the device
//! [`Geometry`] and moves data and encoded tags through the medium.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::driver::{BlockInfo, BlockState, FlashDriver};
use crate::error::{FlashError, FlashResult};
use crate::geometry::Geometry;
use crate::glue::{Glue, TraceMask};
use crate::medium::NorMedium;
use crate::tags::TagRecord;

// ============================================================================
// Statistics
// ============================================================================

/// Flash operation counters.
#[derive(Debug, Default)]
pub struct FlashStats {
    /// Chunk reads (data and/or tags)
    pub chunks_read: AtomicU64,
    /// Chunk writes (data and/or tags)
    pub chunks_written: AtomicU64,
    /// Block erases
    pub erases: AtomicU64,
    /// Blocks marked bad
    pub bad_marked: AtomicU64,
    /// Failed medium operations
    pub errors: AtomicU64,
}

impl FlashStats {
    /// Create zeroed counters
    pub const fn new() -> Self {
        Self {
            chunks_read: AtomicU64::new(0),
            chunks_written: AtomicU64::new(0),
            erases: AtomicU64::new(0),
            bad_marked: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of stats
    pub fn snapshot(&self) -> FlashStatsSnapshot {
        FlashStatsSnapshot {
            chunks_read: self.chunks_read.load(Ordering::Relaxed),
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            erases: self.erases.load(Ordering::Relaxed),
            bad_marked: self.bad_marked.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of flash statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlashStatsSnapshot {
    pub chunks_read: u64,
    pub chunks_written: u64,
    pub erases: u64,
    pub bad_marked: u64,
    pub errors: u64,
}

// ============================================================================
// Flash Device
// ============================================================================

/// Chunk/tag view of a NOR medium.
pub struct FlashDevice<M> {
    /// Layout
    geometry: Geometry,
    /// Backing medium
    medium: M,
    /// Host services
    glue: Glue,
    /// Counters
    stats: FlashStats,
    /// `initialise` has run
    initialised: bool,
}

impl<M: NorMedium> FlashDevice<M> {
    /// Bind a medium. It must be large enough for every block of `geometry`.
    pub fn new(geometry: Geometry, medium: M) -> FlashResult<Self> {
        if medium.size() < geometry.used_size() as usize {
            return Err(FlashError::InvalidGeometry);
        }
        Ok(Self {
            geometry,
            medium,
            glue: Glue::new(),
            stats: FlashStats::new(),
            initialised: false,
        })
    }

    /// Host services shared with the filesystem
    #[inline]
    pub fn glue(&self) -> &Glue {
        &self.glue
    }

    /// Counters
    #[inline]
    pub fn stats(&self) -> &FlashStats {
        &self.stats
    }

    /// Backing medium
    #[inline]
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Whether `initialise` has run
    #[inline]
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Record a failed medium operation
    fn fail(&self, err: FlashError) -> FlashError {
        FlashStats::bump(&self.stats.errors);
        self.glue.record(err);
        if self.glue.traced(TraceMask::ERROR) {
            log::error!("flash: {}", err);
        }
        err
    }

    fn check_chunk(&self, chunk: u32) -> FlashResult<()> {
        if chunk < self.geometry.chunk_count() {
            Ok(())
        } else {
            Err(self.fail(FlashError::OutOfRange))
        }
    }

    fn check_block(&self, block: u32) -> FlashResult<()> {
        if block < self.geometry.block_count() {
            Ok(())
        } else {
            Err(self.fail(FlashError::OutOfRange))
        }
    }

    fn check_data(&self, len: usize) -> FlashResult<()> {
        if len <= self.geometry.data_size() as usize {
            Ok(())
        } else {
            Err(self.fail(FlashError::BufferSize))
        }
    }

    fn load_tags(&self, chunk: u32) -> FlashResult<TagRecord> {
        let mut raw = [0u8; TagRecord::SIZE];
        self.medium
            .read(self.geometry.tag_offset(chunk), &mut raw)
            .map_err(|e| self.fail(e))?;
        Ok(TagRecord::decode(&raw))
    }
}

impl<M: NorMedium> FlashDriver for FlashDevice<M> {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn read_chunk(
        &mut self,
        chunk: u32,
        data: Option<&mut [u8]>,
        tags: Option<&mut TagRecord>,
    ) -> FlashResult<()> {
        let _guard = self.glue.lock();
        self.check_chunk(chunk)?;
        flash_trace!(self.glue, TraceMask::MTD, "read chunk {}", chunk);

        if let Some(data) = data {
            self.check_data(data.len())?;
            self.medium
                .read(self.geometry.chunk_offset(chunk), data)
                .map_err(|e| self.fail(e))?;
        }
        if let Some(tags) = tags {
            *tags = self.load_tags(chunk)?;
        }

        FlashStats::bump(&self.stats.chunks_read);
        Ok(())
    }

    fn write_chunk(
        &mut self,
        chunk: u32,
        data: Option<&[u8]>,
        tags: Option<&TagRecord>,
    ) -> FlashResult<()> {
        let _guard = self.glue.lock();
        self.check_chunk(chunk)?;
        flash_trace!(self.glue, TraceMask::MTD, "write chunk {} (data: {})", chunk, data.is_some());

        if let Some(data) = data {
            self.check_data(data.len())?;
            let offset = self.geometry.chunk_offset(chunk);
            self.medium.program(offset, data).map_err(|e| self.fail(e))?;
        }
        if let Some(tags) = tags {
            let offset = self.geometry.tag_offset(chunk);
            flash_trace!(self.glue, TraceMask::WRITE, "tags chunk {} @ {:#x}: {:?}", chunk, offset, tags);
            self.medium.program(offset, &tags.encode()).map_err(|e| self.fail(e))?;
        }

        FlashStats::bump(&self.stats.chunks_written);
        Ok(())
    }

    fn query_block(&mut self, block: u32) -> FlashResult<BlockInfo> {
        let _guard = self.glue.lock();
        self.check_block(block)?;

        let tag = self.load_tags(self.geometry.first_chunk(block))?;
        let info = BlockState::classify(&tag);
        flash_trace!(self.glue, TraceMask::MTD, "block {} is {:?} (seq {})", block, info.state, info.sequence_number);
        Ok(info)
    }

    fn mark_bad(&mut self, block: u32) -> FlashResult<()> {
        let _guard = self.glue.lock();
        self.check_block(block)?;

        let chunk = self.geometry.first_chunk(block);
        let mut tag = self.load_tags(chunk)?;
        tag.block_bad = true;
        // Clearing the bad bit is a pure program, no erase needed
        let offset = self.geometry.tag_offset(chunk);
        self.medium.program(offset, &tag.encode()).map_err(|e| self.fail(e))?;

        FlashStats::bump(&self.stats.bad_marked);
        flash_trace!(self.glue, TraceMask::BAD_BLOCKS, "block {} marked bad", block);
        Ok(())
    }

    fn erase(&mut self, block: u32) -> FlashResult<()> {
        let _guard = self.glue.lock();
        self.check_block(block)?;

        let offset = self.geometry.address(block, 0);
        flash_trace!(self.glue, TraceMask::ERASE, "erase block {} @ {:#x}", block, offset);
        self.medium
            .erase(offset, self.geometry.block_size() as usize)
            .map_err(|e| self.fail(e))?;

        FlashStats::bump(&self.stats.erases);
        log::debug!("flash: erased block {}", block);
        Ok(())
    }

    fn initialise(&mut self) -> FlashResult<()> {
        let _guard = self.glue.lock();
        if !self.initialised {
            flash_trace!(
                self.glue,
                TraceMask::INIT,
                "flash bring-up: {} blocks of {} bytes, writable: {}",
                self.geometry.block_count(),
                self.geometry.block_size(),
                self.medium.is_writable(),
            );
            self.initialised = true;
            log::info!("flash: {} blocks ready", self.geometry.block_count());
        }
        Ok(())
    }
}

impl<M> core::fmt::Debug for FlashDevice<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlashDevice")
            .field("geometry", &self.geometry)
            .field("initialised", &self.initialised)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Attached;
    use crate::medium::{MappedNor, MemoryNor};

    fn geometry() -> Geometry {
        // 6 blocks of 4 chunks, 32 data + 16 tag bytes each
        Geometry::new(6 * 4 * 48, 32, 16, 4, 1).unwrap()
    }

    fn device() -> FlashDevice<MemoryNor> {
        let g = geometry();
        FlashDevice::new(g, MemoryNor::new(g.device_size() as usize)).unwrap()
    }

    #[test]
    fn test_medium_too_small() {
        let g = geometry();
        let err = FlashDevice::new(g, MemoryNor::new(g.used_size() as usize - 1)).unwrap_err();
        assert_eq!(err, FlashError::InvalidGeometry);
    }

    #[test]
    fn test_write_then_read_chunk() {
        let mut dev = device();
        let data: [u8; 32] = core::array::from_fn(|i| i as u8);
        let tag = TagRecord::used(17);
        dev.write_chunk(5, Some(&data), Some(&tag)).unwrap();

        let mut out = [0u8; 32];
        let mut out_tag = TagRecord::default();
        dev.read_chunk(5, Some(&mut out), Some(&mut out_tag)).unwrap();
        assert_eq!(out, data);
        assert_eq!(out_tag, tag);

        // Data lands at the chunk offset, tags right after it
        let raw = dev.medium().as_bytes();
        let offset = geometry().chunk_offset(5);
        assert_eq!(&raw[offset..offset + 32], &data);
        assert_eq!(&raw[offset + 32..offset + 40], &tag.encode());

        let snap = dev.stats().snapshot();
        assert_eq!(snap.chunks_written, 1);
        assert_eq!(snap.chunks_read, 1);
    }

    #[test]
    fn test_partial_reads_leave_other_output() {
        let mut dev = device();
        dev.write_chunk(2, Some(&[0xAB; 32]), Some(&TagRecord::used(3))).unwrap();

        let mut tag = TagRecord::used(1234);
        let mut data = [0u8; 32];
        dev.read_chunk(2, Some(&mut data), None).unwrap();
        // Tag output was not requested
        assert_eq!(tag, TagRecord::used(1234));
        assert_eq!(data, [0xAB; 32]);

        dev.read_chunk(2, None, Some(&mut tag)).unwrap();
        assert_eq!(tag, TagRecord::used(3));
    }

    #[test]
    fn test_tags_only_write_keeps_data() {
        let mut dev = device();
        dev.write_chunk(4, Some(&[0x42; 32]), None).unwrap();
        dev.write_chunk(4, None, Some(&TagRecord::used(8))).unwrap();

        let mut data = [0u8; 32];
        let mut tag = TagRecord::default();
        dev.read_chunk(4, Some(&mut data), Some(&mut tag)).unwrap();
        assert_eq!(data, [0x42; 32]);
        assert_eq!(tag, TagRecord::used(8));
    }

    #[test]
    fn test_rewrite_without_erase_fails() {
        let mut dev = device();
        dev.write_chunk(0, None, Some(&TagRecord::used(1))).unwrap();
        assert_eq!(dev.write_chunk(0, None, Some(&TagRecord::used(2))), Err(FlashError::NotErased));
        assert_eq!(dev.glue().last_error(), FlashError::NotErased.errno());

        let mut tag = TagRecord::default();
        dev.read_chunk(0, None, Some(&mut tag)).unwrap();
        assert_eq!(tag, TagRecord::used(1));

        dev.write_chunk(1, Some(&[0x0F; 32]), None).unwrap();
        assert_eq!(dev.write_chunk(1, Some(&[0xF0; 32]), None), Err(FlashError::NotErased));
        let mut data = [0u8; 32];
        dev.read_chunk(1, Some(&mut data), None).unwrap();
        assert_eq!(data, [0x0F; 32]);
        assert_eq!(dev.stats().snapshot().errors, 2);

        dev.erase(0).unwrap();
        dev.write_chunk(0, None, Some(&TagRecord::used(2))).unwrap();
        assert_eq!(dev.query_block(0).unwrap().sequence_number, 2);
    }

    #[test]
    fn test_query_block_states() {
        let mut dev = device();
        assert_eq!(dev.query_block(1).unwrap().state, BlockState::Empty);

        dev.write_chunk(geometry().first_chunk(1), Some(&[0; 32]), Some(&TagRecord::used(77))).unwrap();
        assert_eq!(
            dev.query_block(1).unwrap(),
            BlockInfo { state: BlockState::NeedsScan, sequence_number: 77 }
        );

        dev.mark_bad(1).unwrap();
        assert_eq!(
            dev.query_block(1).unwrap(),
            BlockInfo { state: BlockState::Dead, sequence_number: 0 }
        );
        assert_eq!(dev.stats().snapshot().bad_marked, 1);
    }

    #[test]
    fn test_mark_bad_leaves_data() {
        let mut dev = device();
        let chunk = geometry().first_chunk(3);
        dev.write_chunk(chunk, Some(&[0x5A; 32]), Some(&TagRecord::used(9))).unwrap();
        dev.mark_bad(3).unwrap();

        let mut data = [0u8; 32];
        let mut tag = TagRecord::default();
        dev.read_chunk(chunk, Some(&mut data), Some(&mut tag)).unwrap();
        assert_eq!(data, [0x5A; 32]);
        assert_eq!(tag, TagRecord { sequence_number: 9, chunk_used: true, block_bad: true });
    }

    #[test]
    fn test_mark_bad_on_erased_block() {
        let mut dev = device();
        dev.mark_bad(0).unwrap();
        assert_eq!(dev.query_block(0).unwrap().state, BlockState::Dead);
    }

    #[test]
    fn test_erase_resets_block_only() {
        let mut dev = device();
        let g = geometry();
        dev.write_chunk(g.first_chunk(2) + 1, Some(&[1; 32]), Some(&TagRecord::used(5))).unwrap();
        dev.write_chunk(g.first_chunk(3), Some(&[2; 32]), Some(&TagRecord::used(6))).unwrap();

        dev.erase(2).unwrap();

        let mut tag = TagRecord::default();
        dev.read_chunk(g.first_chunk(2) + 1, None, Some(&mut tag)).unwrap();
        assert_eq!(tag, TagRecord::ERASED);
        assert_eq!(dev.query_block(3).unwrap().sequence_number, 6);
        assert_eq!(dev.stats().snapshot().erases, 1);
    }

    #[test]
    fn test_out_of_range_requests() {
        let mut dev = device();
        let g = geometry();
        assert_eq!(dev.read_chunk(g.chunk_count(), None, None), Err(FlashError::OutOfRange));
        assert_eq!(dev.query_block(g.block_count()), Err(FlashError::OutOfRange));
        assert_eq!(dev.write_chunk(0, Some(&[0; 33]), None), Err(FlashError::BufferSize));
        assert_eq!(dev.glue().last_error(), FlashError::BufferSize.errno());
        assert_eq!(dev.stats().snapshot().errors, 3);
    }

    #[test]
    fn test_initialise_idempotent() {
        let mut dev = device();
        assert!(!dev.is_initialised());
        dev.initialise().unwrap();
        dev.initialise().unwrap();
        assert!(dev.is_initialised());
    }

    #[test]
    fn test_attach() {
        let mut attached = Attached::attach("nor0", device()).unwrap();
        assert!(attached.driver().is_initialised());
        assert_eq!(attached.params().name, "nor0");
        assert_eq!(attached.params().end_block, 5);
        assert_eq!(attached.params().reserved_blocks, 1);
    }

    #[test]
    fn test_mapped_medium_reads_and_rejects_writes() {
        let g = geometry();
        let mut image = std::vec![0xFFu8; g.device_size() as usize];
        let tag_at = g.tag_offset(g.first_chunk(2));
        image[tag_at..tag_at + TagRecord::SIZE].copy_from_slice(&TagRecord::used(41).encode());

        let mut dev = FlashDevice::new(g, MappedNor::new(&image)).unwrap();
        dev.initialise().unwrap();
        assert_eq!(dev.query_block(2).unwrap().sequence_number, 41);
        assert_eq!(dev.erase(2), Ok(()));
        assert_eq!(dev.mark_bad(2), Err(FlashError::WriteProtected));
        assert_eq!(dev.glue().last_error(), FlashError::WriteProtected.errno());
        assert_eq!(dev.query_block(2).unwrap().state, BlockState::NeedsScan);
    }
}
