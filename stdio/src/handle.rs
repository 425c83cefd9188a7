//! Stream handles and the table of open file streams.
//!
//! A [`Handle`] is either one of the three standard streams or a reference
//! to a slot in the [`HandleTable`]. File handles carry the slot's
//! generation, so a handle used after close is rejected even when its slot
//! has been reused.

use alloc::vec::Vec;

use crate::error::{StdioError, StdioResult};
use crate::fs::Fd;
use crate::mode::AccessFlags;

/// Default limit on simultaneously open file streams
pub const MAX_FILE_STREAMS: usize = 32;

// ============================================================================
// Handles
// ============================================================================

/// Console-backed stream identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StdStream {
    /// Standard input
    Stdin = 0,
    /// Standard output
    Stdout = 1,
    /// Standard error
    Stderr = 2,
}

/// Reference to a file stream slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId {
    /// Slot index
    slot: u32,
    /// Slot generation at allocation
    generation: u32,
}

/// Opaque stream handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handle {
    /// Standard stream
    Std(StdStream),
    /// File-backed stream
    File(FileId),
}

impl Handle {
    /// Standard input
    pub const STDIN: Self = Self::Std(StdStream::Stdin);
    /// Standard output
    pub const STDOUT: Self = Self::Std(StdStream::Stdout);
    /// Standard error
    pub const STDERR: Self = Self::Std(StdStream::Stderr);

    /// Is a standard stream
    #[inline]
    pub fn is_std(&self) -> bool {
        matches!(self, Self::Std(_))
    }
}

// ============================================================================
// File Stream
// ============================================================================

/// Open file stream; owns exactly one native descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStream {
    /// Native descriptor
    pub fd: Fd,
    /// Access granted at open
    pub flags: AccessFlags,
    /// Bytes read through this stream
    pub bytes_read: u64,
    /// Bytes written through this stream
    pub bytes_written: u64,
}

impl FileStream {
    /// Wrap a descriptor
    pub fn new(fd: Fd, flags: AccessFlags) -> Self {
        Self {
            fd,
            flags,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Record read
    #[inline]
    pub fn record_read(&mut self, bytes: usize) {
        self.bytes_read = self.bytes_read.saturating_add(bytes as u64);
    }

    /// Record write
    #[inline]
    pub fn record_write(&mut self, bytes: usize) {
        self.bytes_written = self.bytes_written.saturating_add(bytes as u64);
    }
}

// ============================================================================
// Handle Table
// ============================================================================

/// Slot state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    /// Free slot
    Free,
    /// Reserved while the filesystem open is in flight
    Opening,
    /// Holds an open stream
    Valid(FileStream),
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    state: SlotState,
    generation: u32,
}

/// Table of open file streams.
#[derive(Debug)]
pub struct HandleTable {
    /// Slots, grown on demand
    slots: Vec<Slot>,
    /// Free slot indices
    free: Vec<u32>,
    /// Maximum concurrent streams
    max_streams: usize,
    /// Streams currently reserved or open
    count: usize,
}

impl HandleTable {
    /// Create an empty table
    pub const fn new(max_streams: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            max_streams,
            count: 0,
        }
    }

    /// Reserve a slot for an open in progress.
    pub fn reserve(&mut self) -> StdioResult<FileId> {
        if self.count >= self.max_streams {
            return Err(StdioError::AllocationFailure);
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots
                    .try_reserve(1)
                    .map_err(|_| StdioError::AllocationFailure)?;
                self.free
                    .try_reserve(self.slots.len() + 1)
                    .map_err(|_| StdioError::AllocationFailure)?;
                self.slots.push(Slot { state: SlotState::Free, generation: 0 });
                (self.slots.len() - 1) as u32
            }
        };

        let entry = &mut self.slots[slot as usize];
        entry.state = SlotState::Opening;
        self.count += 1;
        Ok(FileId { slot, generation: entry.generation })
    }

    /// Fill a reserved slot with its stream.
    pub fn install(&mut self, id: FileId, stream: FileStream) -> StdioResult<()> {
        let entry = self.entry_mut(id)?;
        match entry.state {
            SlotState::Opening => {
                entry.state = SlotState::Valid(stream);
                Ok(())
            }
            _ => Err(StdioError::BadHandle),
        }
    }

    /// Release a slot, reserved or open, returning its stream if it had one.
    pub fn release(&mut self, id: FileId) -> StdioResult<Option<FileStream>> {
        let entry = self.entry_mut(id)?;
        let stream = match entry.state {
            SlotState::Valid(stream) => Some(stream),
            SlotState::Opening => None,
            SlotState::Free => return Err(StdioError::BadHandle),
        };
        entry.state = SlotState::Free;
        entry.generation = entry.generation.wrapping_add(1);

        // Capacity for every slot was reserved when it was created
        self.free.push(id.slot);
        self.count -= 1;
        Ok(stream)
    }

    /// Open stream behind a handle
    pub fn get(&self, id: FileId) -> StdioResult<&FileStream> {
        match self.slots.get(id.slot as usize) {
            Some(Slot { state: SlotState::Valid(stream), generation }) if *generation == id.generation => {
                Ok(stream)
            }
            _ => Err(StdioError::BadHandle),
        }
    }

    /// Open stream behind a handle (mutable)
    pub fn get_mut(&mut self, id: FileId) -> StdioResult<&mut FileStream> {
        match self.slots.get_mut(id.slot as usize) {
            Some(Slot { state: SlotState::Valid(stream), generation }) if *generation == id.generation => {
                Ok(stream)
            }
            _ => Err(StdioError::BadHandle),
        }
    }

    /// Number of reserved or open streams
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    fn entry_mut(&mut self, id: FileId) -> StdioResult<&mut Slot> {
        match self.slots.get_mut(id.slot as usize) {
            Some(entry) if entry.generation == id.generation => Ok(entry),
            _ => Err(StdioError::BadHandle),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(fd: i32) -> FileStream {
        FileStream::new(Fd(fd), AccessFlags::READ)
    }

    #[test]
    fn test_reserve_install_release() {
        let mut table = HandleTable::new(4);
        let id = table.reserve().unwrap();
        assert_eq!(table.count(), 1);
        assert_eq!(table.get(id), Err(StdioError::BadHandle));

        table.install(id, stream(7)).unwrap();
        assert_eq!(table.get(id).unwrap().fd, Fd(7));

        assert_eq!(table.release(id).unwrap(), Some(stream(7)));
        assert_eq!(table.count(), 0);
        assert_eq!(table.get(id), Err(StdioError::BadHandle));
        assert_eq!(table.release(id), Err(StdioError::BadHandle));
    }

    #[test]
    fn test_release_reserved_slot() {
        let mut table = HandleTable::new(4);
        let id = table.reserve().unwrap();
        assert_eq!(table.release(id).unwrap(), None);
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut table = HandleTable::new(4);
        let old = table.reserve().unwrap();
        table.install(old, stream(3)).unwrap();
        table.release(old).unwrap();

        let new = table.reserve().unwrap();
        table.install(new, stream(4)).unwrap();
        assert_ne!(old, new);
        assert_eq!(table.get(old), Err(StdioError::BadHandle));
        assert_eq!(table.get(new).unwrap().fd, Fd(4));
    }

    #[test]
    fn test_table_limit() {
        let mut table = HandleTable::new(2);
        table.reserve().unwrap();
        let second = table.reserve().unwrap();
        assert_eq!(table.reserve(), Err(StdioError::AllocationFailure));

        table.release(second).unwrap();
        assert!(table.reserve().is_ok());
    }

    #[test]
    fn test_stream_counters() {
        let mut table = HandleTable::new(1);
        let id = table.reserve().unwrap();
        table.install(id, stream(5)).unwrap();

        let s = table.get_mut(id).unwrap();
        s.record_read(10);
        s.record_write(4);
        s.record_write(2);
        assert_eq!(table.get(id).unwrap().bytes_read, 10);
        assert_eq!(table.get(id).unwrap().bytes_written, 6);
    }

    #[test]
    fn test_std_handles() {
        assert!(Handle::STDOUT.is_std());
        assert_ne!(Handle::STDIN, Handle::STDERR);
    }
}
