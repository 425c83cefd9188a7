//! OS glue context for the flash filesystem.
//!
//! A flash filesystem expects its host to provide a lock, a clock, an
//! error register, a trace mask and a bug hook. [`Glue`] carries all of
//! them as one explicit object so several devices (or tests) never share
//! hidden state.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use bitflags::bitflags;
use spin::{Mutex, MutexGuard};

use crate::error::FlashError;

bitflags! {
    /// Trace categories
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceMask: u32 {
        /// Errors reported by the medium
        const ERROR = 1 << 0;
        /// Chunk reads and writes
        const MTD = 1 << 1;
        /// Tag programming
        const WRITE = 1 << 2;
        /// Block erases
        const ERASE = 1 << 3;
        /// Bad block handling
        const BAD_BLOCKS = 1 << 4;
        /// Driver bring-up
        const INIT = 1 << 5;
    }
}

impl TraceMask {
    /// Mask a fresh context starts with
    pub const fn initial() -> Self {
        if cfg!(feature = "trace") {
            Self::all()
        } else {
            Self::ERROR.union(Self::BAD_BLOCKS)
        }
    }
}

/// Host services handed to the flash filesystem.
pub struct Glue {
    /// Filesystem-wide lock
    lock: Mutex<()>,
    /// Last error, as a negative errno
    last_error: AtomicI32,
    /// Enabled trace categories
    trace: AtomicU32,
}

impl Glue {
    /// Create a context with the initial trace mask
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            last_error: AtomicI32::new(0),
            trace: AtomicU32::new(TraceMask::initial().bits()),
        }
    }

    /// Acquire the filesystem lock; released when the guard drops.
    ///
    /// Uncontended on a single execution context.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Seconds since epoch. No RTC is available, so always zero.
    #[inline]
    pub fn current_time(&self) -> u32 {
        0
    }

    /// Store an error code
    #[inline]
    pub fn set_error(&self, errno: i32) {
        self.last_error.store(errno, Ordering::Relaxed);
    }

    /// Store a flash error
    #[inline]
    pub fn record(&self, err: FlashError) {
        self.set_error(err.errno());
    }

    /// Last stored error code
    #[inline]
    pub fn last_error(&self) -> i32 {
        self.last_error.load(Ordering::Relaxed)
    }

    /// Current trace mask
    #[inline]
    pub fn trace_mask(&self) -> TraceMask {
        TraceMask::from_bits_truncate(self.trace.load(Ordering::Relaxed))
    }

    /// Replace the trace mask
    pub fn set_trace_mask(&self, mask: TraceMask) {
        self.trace.store(mask.bits(), Ordering::Relaxed);
    }

    /// Whether any of `mask` is being traced
    #[inline]
    pub fn traced(&self, mask: TraceMask) -> bool {
        self.trace_mask().intersects(mask)
    }

    /// Report an internal inconsistency detected by the filesystem.
    pub fn bug(&self, file: &str, line: u32) {
        log::error!("BUG in {} line {}", file, line);
    }
}

impl Default for Glue {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Glue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Glue")
            .field("last_error", &self.last_error())
            .field("trace", &self.trace_mask())
            .finish()
    }
}

/// Log through `log::trace!` when the category is enabled on the context.
macro_rules! flash_trace {
    ($glue:expr, $mask:expr, $($arg:tt)+) => {
        if $glue.traced($mask) {
            log::trace!(target: "helixflash", $($arg)+);
        }
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_slot() {
        let glue = Glue::new();
        assert_eq!(glue.last_error(), 0);

        glue.record(FlashError::WriteProtected);
        assert_eq!(glue.last_error(), -30);

        glue.set_error(0);
        assert_eq!(glue.last_error(), 0);
    }

    #[test]
    fn test_trace_mask() {
        let glue = Glue::new();
        glue.set_trace_mask(TraceMask::ERASE | TraceMask::MTD);
        assert!(glue.traced(TraceMask::ERASE));
        assert!(glue.traced(TraceMask::MTD | TraceMask::INIT));
        assert!(!glue.traced(TraceMask::BAD_BLOCKS));

        glue.set_trace_mask(TraceMask::empty());
        assert!(!glue.traced(TraceMask::all()));
    }

    #[test]
    fn test_lock_is_reacquirable() {
        let glue = Glue::new();
        drop(glue.lock());
        let _guard = glue.lock();
        assert_eq!(glue.current_time(), 0);
    }
}
