//! Error types for flash medium and driver operations.

use core::fmt;

/// Result type alias for flash operations.
pub type FlashResult<T> = Result<T, FlashError>;

/// Errors surfaced by a NOR medium binding or the device adapter.
///
/// The in-memory medium only fails out-of-range requests and programs over
/// cells that were not erased; a production binding reports real I/O failures through
/// [`FlashError::Io`], which the filesystem treats as fatal to the block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum FlashError {
    /// Offset or length falls outside the medium
    OutOfRange     = 1,
    /// Caller buffer does not match the chunk region it targets
    BufferSize     = 2,
    /// Medium has no program path wired up
    WriteProtected = 3,
    /// Hardware reported a failure
    Io             = 4,
    /// Geometry parameters are inconsistent
    InvalidGeometry = 5,
    /// Program would need a 0 to 1 bit transition; erase first
    NotErased      = 6,
}

impl FlashError {
    /// Negative POSIX error code, as stored in the glue error slot.
    pub const fn errno(self) -> i32 {
        match self {
            Self::OutOfRange => -34,      // ERANGE
            Self::BufferSize => -22,      // EINVAL
            Self::WriteProtected => -30,  // EROFS
            Self::Io => -5,               // EIO
            Self::InvalidGeometry => -22, // EINVAL
            Self::NotErased => -5,        // EIO
        }
    }

    /// Short description
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutOfRange => "access outside flash medium",
            Self::BufferSize => "buffer does not fit chunk region",
            Self::WriteProtected => "flash medium is write protected",
            Self::Io => "flash I/O error",
            Self::InvalidGeometry => "invalid flash geometry",
            Self::NotErased => "program over unerased cells",
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
