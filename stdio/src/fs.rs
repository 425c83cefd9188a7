//! Filesystem contract consumed by the stream layer.
//!
//! The flash filesystem itself lives outside this crate; streams only need
//! descriptor-style open/close/read/write/seek from it.

use core::fmt;

use crate::mode::AccessFlags;

/// Result type alias for filesystem calls.
pub type FsResult<T> = Result<T, FsError>;

/// Errors a filesystem reports back to the stream layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum FsError {
    /// No such file
    NotFound        = 2,
    /// Generic I/O failure
    Io              = 5,
    /// Descriptor is not open, or not open for this access
    BadDescriptor   = 9,
    /// File already exists
    AlreadyExists   = 17,
    /// Path names a directory
    IsDirectory     = 21,
    /// Bad argument (negative seek, malformed path)
    InvalidArgument = 22,
    /// Too many open descriptors
    TooManyOpen     = 24,
    /// Medium is full
    NoSpace         = 28,
    /// Filesystem is mounted read-only
    ReadOnly        = 30,
}

impl FsError {
    /// Negative POSIX error code
    #[inline]
    pub const fn errno(self) -> i32 {
        -(self as i32)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "no such file",
            Self::Io => "input/output error",
            Self::BadDescriptor => "bad file descriptor",
            Self::AlreadyExists => "file exists",
            Self::IsDirectory => "is a directory",
            Self::InvalidArgument => "invalid argument",
            Self::TooManyOpen => "too many open files",
            Self::NoSpace => "no space left on device",
            Self::ReadOnly => "read-only filesystem",
        };
        f.write_str(msg)
    }
}

/// Native file descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fd(pub i32);

/// Seek origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Whence {
    /// From the start of the file
    Start = 0,
    /// From the current position
    Current = 1,
    /// From the end of the file
    End = 2,
}

/// Owner read/write, the permission mask every stream creates files with
pub const DEFAULT_PERMISSIONS: u32 = 0o600;

/// Descriptor-level file access.
pub trait FileSystem {
    /// Open `path`, creating it with `permissions` when `flags` ask for it.
    fn open(&mut self, path: &str, flags: AccessFlags, permissions: u32) -> FsResult<Fd>;

    /// Release a descriptor.
    fn close(&mut self, fd: Fd) -> FsResult<()>;

    /// Read at the current position; short only at end of file.
    fn read(&mut self, fd: Fd, buffer: &mut [u8]) -> FsResult<usize>;

    /// Write at the current position (or the end, for append).
    fn write(&mut self, fd: Fd, data: &[u8]) -> FsResult<usize>;

    /// Move the position; returns the new absolute offset.
    fn lseek(&mut self, fd: Fd, offset: i64, whence: Whence) -> FsResult<u64>;
}

impl<F: FileSystem + ?Sized> FileSystem for &mut F {
    fn open(&mut self, path: &str, flags: AccessFlags, permissions: u32) -> FsResult<Fd> {
        (**self).open(path, flags, permissions)
    }

    fn close(&mut self, fd: Fd) -> FsResult<()> {
        (**self).close(fd)
    }

    fn read(&mut self, fd: Fd, buffer: &mut [u8]) -> FsResult<usize> {
        (**self).read(fd, buffer)
    }

    fn write(&mut self, fd: Fd, data: &[u8]) -> FsResult<usize> {
        (**self).write(fd, data)
    }

    fn lseek(&mut self, fd: Fd, offset: i64, whence: Whence) -> FsResult<u64> {
        (**self).lseek(fd, offset, whence)
    }
}
