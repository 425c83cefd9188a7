//! In-memory filesystem.
//!
//! Flat namespace of absolute paths, each holding a byte vector. Lets the
//! stream layer run without a flash filesystem mounted underneath.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::fs::{Fd, FileSystem, FsError, FsResult, Whence};
use crate::mode::AccessFlags;

/// Default limit on simultaneously open descriptors
pub const MAX_OPEN_FILES: usize = 64;

// ============================================================================
// Open File
// ============================================================================

/// State behind one descriptor.
#[derive(Clone, Debug)]
struct OpenFile {
    /// File the descriptor refers to
    path: String,
    /// Access granted at open
    flags: AccessFlags,
    /// Current position
    pos: u64,
}

impl OpenFile {
    fn new(path: &str, flags: AccessFlags) -> Self {
        Self {
            path: path.to_string(),
            flags,
            pos: 0,
        }
    }
}

// ============================================================================
// RAM Filesystem
// ============================================================================

/// Heap-backed [`FileSystem`].
#[derive(Debug)]
pub struct RamFs {
    /// File contents by path
    files: BTreeMap<String, Vec<u8>>,
    /// Open descriptors
    open: BTreeMap<Fd, OpenFile>,
    /// Next descriptor number
    next_fd: i32,
    /// Descriptor limit
    max_open: usize,
    /// Total byte budget, if any
    capacity: Option<usize>,
}

impl RamFs {
    /// Create an empty filesystem
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            open: BTreeMap::new(),
            next_fd: 3,
            max_open: MAX_OPEN_FILES,
            capacity: None,
        }
    }

    /// Limit the total number of stored bytes
    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Limit the number of open descriptors
    pub fn with_max_open(mut self, max_open: usize) -> Self {
        self.max_open = max_open;
        self
    }

    /// Whether a file exists
    pub fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// File contents
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Number of open descriptors
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Total stored bytes
    pub fn used_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    fn check_path(path: &str) -> FsResult<()> {
        if !path.starts_with('/') {
            return Err(FsError::InvalidArgument);
        }
        if path.ends_with('/') {
            return Err(FsError::IsDirectory);
        }
        Ok(())
    }

    fn descriptor(&self, fd: Fd) -> FsResult<&OpenFile> {
        self.open.get(&fd).ok_or(FsError::BadDescriptor)
    }

    fn alloc_fd(&mut self) -> Fd {
        loop {
            let fd = Fd(self.next_fd);
            self.next_fd = self.next_fd.checked_add(1).unwrap_or(3);
            if !self.open.contains_key(&fd) {
                return fd;
            }
        }
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RamFs {
    fn open(&mut self, path: &str, flags: AccessFlags, permissions: u32) -> FsResult<Fd> {
        Self::check_path(path)?;
        if self.open.len() >= self.max_open {
            return Err(FsError::TooManyOpen);
        }

        match self.files.get_mut(path) {
            Some(data) => {
                if flags.contains(AccessFlags::TRUNCATE) {
                    data.clear();
                }
            }
            None if flags.contains(AccessFlags::CREATE) => {
                log::trace!("ramfs: create {} ({:o})", path, permissions);
                self.files.insert(path.to_string(), Vec::new());
            }
            None => return Err(FsError::NotFound),
        }

        let fd = self.alloc_fd();
        self.open.insert(fd, OpenFile::new(path, flags));
        Ok(fd)
    }

    fn close(&mut self, fd: Fd) -> FsResult<()> {
        self.open.remove(&fd).map(|_| ()).ok_or(FsError::BadDescriptor)
    }

    fn read(&mut self, fd: Fd, buffer: &mut [u8]) -> FsResult<usize> {
        let file = self.open.get_mut(&fd).ok_or(FsError::BadDescriptor)?;
        if !file.flags.can_read() {
            return Err(FsError::BadDescriptor);
        }
        let data = self.files.get(&file.path).ok_or(FsError::Io)?;

        let start = (file.pos as usize).min(data.len());
        let count = buffer.len().min(data.len() - start);
        buffer[..count].copy_from_slice(&data[start..start + count]);
        file.pos += count as u64;
        Ok(count)
    }

    fn write(&mut self, fd: Fd, buffer: &[u8]) -> FsResult<usize> {
        let used = self.used_bytes();
        let file = self.open.get_mut(&fd).ok_or(FsError::BadDescriptor)?;
        if !file.flags.can_write() {
            return Err(FsError::BadDescriptor);
        }
        let data = self.files.get_mut(&file.path).ok_or(FsError::Io)?;

        if file.flags.contains(AccessFlags::APPEND) {
            file.pos = data.len() as u64;
        }
        let start = usize::try_from(file.pos).map_err(|_| FsError::InvalidArgument)?;
        let end = start.checked_add(buffer.len()).ok_or(FsError::InvalidArgument)?;

        if end > data.len() {
            let growth = end - data.len();
            if let Some(capacity) = self.capacity {
                if used + growth > capacity {
                    return Err(FsError::NoSpace);
                }
            }
            data.try_reserve(growth).map_err(|_| FsError::NoSpace)?;
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buffer);
        file.pos = end as u64;
        Ok(buffer.len())
    }

    fn lseek(&mut self, fd: Fd, offset: i64, whence: Whence) -> FsResult<u64> {
        let file = self.descriptor(fd)?;
        let len = self.files.get(&file.path).map_or(0, Vec::len) as i64;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => file.pos as i64,
            Whence::End => len,
        };
        let pos = base.checked_add(offset).filter(|p| *p >= 0).ok_or(FsError::InvalidArgument)?;

        if let Some(file) = self.open.get_mut(&fd) {
            file.pos = pos as u64;
        }
        Ok(pos as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DEFAULT_PERMISSIONS;
    use crate::mode::parse_mode;

    fn open(fs: &mut RamFs, path: &str, mode: &str) -> FsResult<Fd> {
        fs.open(path, parse_mode(mode).unwrap(), DEFAULT_PERMISSIONS)
    }

    #[test]
    fn test_create_write_read() {
        let mut fs = RamFs::new();
        let fd = open(&mut fs, "/a", "w").unwrap();
        assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
        fs.close(fd).unwrap();
        assert_eq!(fs.contents("/a"), Some(&b"hello"[..]));

        let fd = open(&mut fs, "/a", "r").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_open_missing() {
        let mut fs = RamFs::new();
        assert_eq!(open(&mut fs, "/missing", "r"), Err(FsError::NotFound));
        assert_eq!(open(&mut fs, "/missing", "r+"), Err(FsError::NotFound));
        assert!(!fs.exists("/missing"));
    }

    #[test]
    fn test_bad_paths() {
        let mut fs = RamFs::new();
        assert_eq!(open(&mut fs, "relative", "w"), Err(FsError::InvalidArgument));
        assert_eq!(open(&mut fs, "/dir/", "w"), Err(FsError::IsDirectory));
    }

    #[test]
    fn test_access_checks() {
        let mut fs = RamFs::new();
        let fd = open(&mut fs, "/a", "w").unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(fs.read(fd, &mut buf), Err(FsError::BadDescriptor));

        let fd = open(&mut fs, "/a", "r").unwrap();
        assert_eq!(fs.write(fd, b"x"), Err(FsError::BadDescriptor));

        fs.close(fd).unwrap();
        assert_eq!(fs.close(fd), Err(FsError::BadDescriptor));
    }

    #[test]
    fn test_truncate_and_append() {
        let mut fs = RamFs::new();
        let fd = open(&mut fs, "/log", "w").unwrap();
        fs.write(fd, b"abc").unwrap();

        let fd = open(&mut fs, "/log", "a").unwrap();
        fs.lseek(fd, 0, Whence::Start).unwrap();
        fs.write(fd, b"def").unwrap();
        assert_eq!(fs.contents("/log"), Some(&b"abcdef"[..]));

        open(&mut fs, "/log", "w").unwrap();
        assert_eq!(fs.contents("/log"), Some(&b""[..]));
    }

    #[test]
    fn test_seek_and_sparse_write() {
        let mut fs = RamFs::new();
        let fd = open(&mut fs, "/s", "w+").unwrap();
        fs.write(fd, b"0123456789").unwrap();
        assert_eq!(fs.lseek(fd, -3, Whence::End).unwrap(), 7);
        assert_eq!(fs.lseek(fd, 1, Whence::Current).unwrap(), 8);
        assert_eq!(fs.lseek(fd, -9, Whence::Current), Err(FsError::InvalidArgument));

        fs.lseek(fd, 12, Whence::Start).unwrap();
        fs.write(fd, b"!").unwrap();
        assert_eq!(fs.contents("/s"), Some(&b"0123456789\0\0!"[..]));
    }

    #[test]
    fn test_limits() {
        let mut fs = RamFs::new().with_capacity(4).with_max_open(2);
        let fd = open(&mut fs, "/a", "w").unwrap();
        assert_eq!(fs.write(fd, b"12345"), Err(FsError::NoSpace));
        assert_eq!(fs.write(fd, b"1234").unwrap(), 4);

        open(&mut fs, "/b", "w").unwrap();
        assert_eq!(open(&mut fs, "/c", "w"), Err(FsError::TooManyOpen));
        assert_eq!(fs.open_count(), 2);
    }
}
