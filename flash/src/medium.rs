//! NOR medium bindings.
//!
//! The device adapter only computes offsets; everything that touches the
//! physical part goes through a [`NorMedium`]. Two bindings are provided:
//!
//! - [`MemoryNor`]: heap-backed, with real NOR semantics (programming can
//!   only clear bits and is rejected otherwise, erase returns a region to
//!   `0xFF`).
//! - [`MappedNor`]: read-only view of a memory-mapped flash window. There is
//!   no program path, so programs fail with `WriteProtected` and erase is a
//!   placeholder that succeeds without touching the part.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{FlashError, FlashResult};

/// Value of an erased byte
pub const ERASED_BYTE: u8 = 0xFF;

// ============================================================================
// Medium Trait
// ============================================================================

/// Byte-addressed NOR flash.
pub trait NorMedium {
    /// Medium size in bytes
    fn size(&self) -> usize;

    /// Copy `buffer.len()` bytes starting at `offset`.
    fn read(&self, offset: usize, buffer: &mut [u8]) -> FlashResult<()>;

    /// Program `data` at `offset`. Bits can only go from 1 to 0; a program
    /// that needs a 0 to 1 transition fails with `NotErased` and leaves the
    /// medium unchanged.
    fn program(&mut self, offset: usize, data: &[u8]) -> FlashResult<()>;

    /// Return `len` bytes at `offset` to the erased state.
    fn erase(&mut self, offset: usize, len: usize) -> FlashResult<()>;

    /// Whether program/erase reach the part
    fn is_writable(&self) -> bool {
        true
    }

    /// Check that a request fits the medium
    #[inline]
    fn check_range(&self, offset: usize, len: usize) -> FlashResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(FlashError::OutOfRange),
        }
    }
}

// ============================================================================
// Memory NOR
// ============================================================================

/// Heap-backed NOR medium.
pub struct MemoryNor {
    /// Storage, starts fully erased
    cells: Vec<u8>,
}

impl MemoryNor {
    /// Create an erased medium of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![ERASED_BYTE; size],
        }
    }

    /// Raw contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }
}

impl core::fmt::Debug for MemoryNor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryNor").field("size", &self.cells.len()).finish()
    }
}

impl NorMedium for MemoryNor {
    fn size(&self) -> usize {
        self.cells.len()
    }

    fn read(&self, offset: usize, buffer: &mut [u8]) -> FlashResult<()> {
        self.check_range(offset, buffer.len())?;
        buffer.copy_from_slice(&self.cells[offset..offset + buffer.len()]);
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> FlashResult<()> {
        self.check_range(offset, data.len())?;
        let cells = &mut self.cells[offset..offset + data.len()];
        if cells.iter().zip(data).any(|(cell, byte)| cell & byte != *byte) {
            return Err(FlashError::NotErased);
        }
        cells.copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self, offset: usize, len: usize) -> FlashResult<()> {
        self.check_range(offset, len)?;
        self.cells[offset..offset + len].fill(ERASED_BYTE);
        Ok(())
    }
}

// ============================================================================
// Mapped NOR
// ============================================================================

/// Read-only view of memory-mapped flash.
#[derive(Debug)]
pub struct MappedNor<'a> {
    /// Mapped window
    window: &'a [u8],
}

impl<'a> MappedNor<'a> {
    /// Wrap an already mapped window
    pub fn new(window: &'a [u8]) -> Self {
        Self { window }
    }
}

impl MappedNor<'static> {
    /// Wrap a window given by its base address.
    ///
    /// # Safety
    /// `base` must point to `size` bytes of mapped flash that stay mapped
    /// and are not written through any other path for the program lifetime.
    pub unsafe fn from_raw(base: *const u8, size: usize) -> Self {
        // SAFETY: upheld by the caller
        let window = unsafe { core::slice::from_raw_parts(base, size) };
        Self { window }
    }
}

impl NorMedium for MappedNor<'_> {
    fn size(&self) -> usize {
        self.window.len()
    }

    fn read(&self, offset: usize, buffer: &mut [u8]) -> FlashResult<()> {
        self.check_range(offset, buffer.len())?;
        buffer.copy_from_slice(&self.window[offset..offset + buffer.len()]);
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> FlashResult<()> {
        self.check_range(offset, data.len())?;
        Err(FlashError::WriteProtected)
    }

    fn erase(&mut self, offset: usize, len: usize) -> FlashResult<()> {
        self.check_range(offset, len)?;
        log::warn!("erase of {:#x}+{:#x} ignored: no program path on mapped flash", offset, len);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
