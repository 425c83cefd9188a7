//! Growable scratch buffer for formatted output.
//!
//! Starts at a fixed capacity and doubles whenever the rendered text would
//! not fit, so output is never truncated. Allocation failure is reported
//! instead of aborting.

use alloc::vec::Vec;
use core::fmt::{self, Write};

use crate::error::{StdioError, StdioResult};

/// Initial capacity of the scratch buffer
pub const DEFAULT_FORMAT_CAPACITY: usize = 256;

/// Scratch buffer used by a single formatted write.
#[derive(Debug)]
pub struct FormatBuffer {
    /// Rendered bytes
    buf: Vec<u8>,
    /// Capacity the buffer is allowed to use before doubling
    limit: usize,
    /// An allocation failed mid-render
    oom: bool,
}

impl FormatBuffer {
    /// Allocate a buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> StdioResult<Self> {
        let limit = capacity.max(1);
        let mut buf = Vec::new();
        buf.try_reserve_exact(limit)
            .map_err(|_| StdioError::AllocationFailure)?;
        Ok(Self { buf, limit, oom: false })
    }

    /// Render `args` into a fresh buffer.
    ///
    /// Fails with `Format` if any formatting impl fails; partial output is
    /// never returned.
    pub fn render(capacity: usize, args: fmt::Arguments<'_>) -> StdioResult<Self> {
        let mut out = Self::with_capacity(capacity)?;
        match out.write_fmt(args) {
            Ok(()) => Ok(out),
            Err(_) if out.oom => Err(StdioError::AllocationFailure),
            Err(_) => Err(StdioError::Format),
        }
    }

    /// Rendered bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Current capacity limit
    #[inline]
    pub fn capacity(&self) -> usize {
        self.limit
    }

    fn grow_for(&mut self, extra: usize) -> fmt::Result {
        let needed = self.buf.len().checked_add(extra).ok_or(fmt::Error)?;
        let mut limit = self.limit;
        while limit < needed {
            limit = limit.checked_mul(2).ok_or(fmt::Error)?;
        }
        if limit != self.limit {
            if self.buf.try_reserve_exact(limit - self.buf.len()).is_err() {
                self.oom = true;
                return Err(fmt::Error);
            }
            self.limit = limit;
        }
        Ok(())
    }
}

impl Write for FormatBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.grow_for(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn test_short_output_keeps_capacity() {
        let out = FormatBuffer::render(256, format_args!("{}-{}", 1, "two")).unwrap();
        assert_eq!(out.as_bytes(), b"1-two");
        assert_eq!(out.capacity(), 256);
    }

    #[test]
    fn test_long_output_doubles() {
        let long: String = core::iter::repeat('x').take(1000).collect();
        let out = FormatBuffer::render(256, format_args!("{}", long)).unwrap();
        assert_eq!(out.as_bytes(), long.as_bytes());
        assert_eq!(out.capacity(), 1024);
    }

    #[test]
    fn test_growth_across_pieces() {
        let out = FormatBuffer::render(4, format_args!("{}{}{}", "abc", "defg", "hijklmnop")).unwrap();
        assert_eq!(out.as_bytes(), b"abcdefghijklmnop");
        assert_eq!(out.capacity(), 16);
    }

    struct Failing;

    impl fmt::Display for Failing {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("partial")?;
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_failing_display_is_an_error() {
        let err = FormatBuffer::render(256, format_args!("head {} tail", Failing)).unwrap_err();
        assert_eq!(err, StdioError::Format);
    }

    #[test]
    fn test_zero_capacity_still_renders() {
        let out = FormatBuffer::render(0, format_args!("ok")).unwrap();
        assert_eq!(out.as_bytes(), b"ok");
    }
}
