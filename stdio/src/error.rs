//! Error types for the stream layer.

use core::fmt;

use crate::fs::FsError;

/// Result type alias for stream operations.
pub type StdioResult<T> = Result<T, StdioError>;

/// Errors reported by stream operations.
///
/// Every failure is also stored in the context's last-error slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StdioError {
    /// Malformed or contradictory mode string
    InvalidMode,
    /// The filesystem rejected the request
    Io(FsError),
    /// Operation is not defined on this stream
    UnsupportedOperation,
    /// Handle slot or buffer could not be allocated
    AllocationFailure,
    /// Handle was closed or never opened
    BadHandle,
    /// A formatting trait implementation reported failure
    Format,
}

impl StdioError {
    /// Negative POSIX error code
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidMode => -22, // EINVAL
            Self::Io(err) => err.errno(),
            Self::UnsupportedOperation => -95, // ENOTSUP
            Self::AllocationFailure => -12,    // ENOMEM
            Self::BadHandle => -9,             // EBADF
            Self::Format => -75,               // EOVERFLOW
        }
    }
}

impl From<FsError> for StdioError {
    fn from(err: FsError) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for StdioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMode => f.write_str("invalid open mode"),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::UnsupportedOperation => f.write_str("operation not supported on stream"),
            Self::AllocationFailure => f.write_str("out of memory"),
            Self::BadHandle => f.write_str("bad stream handle"),
            Self::Format => f.write_str("formatting failed"),
        }
    }
}
