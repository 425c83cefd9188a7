//! Stream adapter.
//!
//! [`Stdio`] is the context a scripting runtime performs all of its C-style
//! stream I/O through. Standard streams go straight to the console; file
//! streams are forwarded to the filesystem by descriptor.
//!
//! Every operation runs under the context lock and records failures in the
//! last-error slot before returning them.

use alloc::vec::Vec;
use core::fmt;

use spin::{Mutex, MutexGuard};

use crate::console::Console;
use crate::error::{StdioError, StdioResult};
use crate::format::{FormatBuffer, DEFAULT_FORMAT_CAPACITY};
use crate::fs::{FileSystem, FsError, Whence, DEFAULT_PERMISSIONS};
use crate::handle::{FileStream, Handle, HandleTable, StdStream, MAX_FILE_STREAMS};
use crate::mode::parse_mode;

// ============================================================================
// Configuration
// ============================================================================

/// Tunables of a stream context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StdioConfig {
    /// Initial scratch capacity for formatted writes
    pub format_capacity: usize,
    /// Maximum simultaneously open file streams
    pub max_files: usize,
    /// Permission mask for files created by `open`
    pub permissions: u32,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            format_capacity: DEFAULT_FORMAT_CAPACITY,
            max_files: MAX_FILE_STREAMS,
            permissions: DEFAULT_PERMISSIONS,
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// State guarded by the context lock.
struct Inner<F, C> {
    fs: F,
    console: C,
    table: HandleTable,
    last_error: Option<StdioError>,
}

/// Stream context over a filesystem and a console.
pub struct Stdio<F, C> {
    inner: Mutex<Inner<F, C>>,
    config: StdioConfig,
}

impl<F: FileSystem, C: Console> Stdio<F, C> {
    /// Create a context with default configuration
    pub fn new(fs: F, console: C) -> Self {
        Self::with_config(fs, console, StdioConfig::default())
    }

    /// Create a context
    pub fn with_config(fs: F, console: C, config: StdioConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                fs,
                console,
                table: HandleTable::new(config.max_files),
                last_error: None,
            }),
            config,
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &StdioConfig {
        &self.config
    }

    /// Acquire the stream lock; released when the guard drops.
    fn lock(&self) -> MutexGuard<'_, Inner<F, C>> {
        self.inner.lock()
    }

    /// Run `op` under the lock, latching its error.
    fn with<R>(&self, op: impl FnOnce(&mut Inner<F, C>) -> StdioResult<R>) -> StdioResult<R> {
        let mut inner = self.lock();
        let result = op(&mut *inner);
        if let Err(err) = &result {
            inner.last_error = Some(*err);
        }
        result
    }

    /// Most recent error reported by any operation
    pub fn last_error(&self) -> Option<StdioError> {
        self.lock().last_error
    }

    /// Clear the last-error slot
    pub fn clear_error(&self) {
        self.lock().last_error = None;
    }

    /// Release the context, returning the filesystem and console
    pub fn into_parts(self) -> (F, C) {
        let inner = self.inner.into_inner();
        (inner.fs, inner.console)
    }

    /// Run `f` with the filesystem borrowed
    pub fn with_fs<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        f(&mut self.lock().fs)
    }

    /// Run `f` with the console borrowed
    pub fn with_console<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.lock().console)
    }

    /// Number of open file streams
    pub fn open_files(&self) -> usize {
        self.lock().table.count()
    }

    // ------------------------------------------------------------------------
    // Open / close
    // ------------------------------------------------------------------------

    /// Open `path` with a C mode string.
    pub fn open(&self, path: &str, mode: &str) -> StdioResult<Handle> {
        let permissions = self.config.permissions;
        self.with(|inner| {
            let flags = parse_mode(mode)?;
            let id = inner.table.reserve()?;

            match inner.fs.open(path, flags, permissions) {
                Ok(fd) => {
                    inner.table.install(id, FileStream::new(fd, flags))?;
                    log::debug!("open {} ({}) -> {:?}", path, mode, fd);
                    Ok(Handle::File(id))
                }
                Err(err) => {
                    inner.table.release(id)?;
                    log::debug!("open {} ({}) failed: {}", path, mode, err);
                    Err(StdioError::Io(err))
                }
            }
        })
    }

    /// Close a stream. Closing a standard stream does nothing.
    pub fn close(&self, handle: Handle) -> StdioResult<()> {
        self.with(|inner| match handle {
            Handle::Std(_) => Ok(()),
            Handle::File(id) => {
                let stream = inner.table.release(id)?.ok_or(StdioError::BadHandle)?;
                inner.fs.close(stream.fd)?;
                log::debug!("close {:?}", stream.fd);
                Ok(())
            }
        })
    }

    /// Point an open file stream at a new file, keeping the handle.
    ///
    /// On failure the stream is released and the handle becomes invalid.
    pub fn reopen(&self, path: &str, mode: &str, handle: Handle) -> StdioResult<Handle> {
        let permissions = self.config.permissions;
        self.with(|inner| {
            let id = match handle {
                Handle::Std(_) => return Err(StdioError::UnsupportedOperation),
                Handle::File(id) => id,
            };
            let old = *inner.table.get(id)?;
            if let Err(err) = inner.fs.close(old.fd) {
                log::warn!("reopen: closing {:?} failed: {}", old.fd, err);
            }

            let opened = parse_mode(mode)
                .and_then(|flags| Ok((inner.fs.open(path, flags, permissions)?, flags)));
            match opened {
                Ok((fd, flags)) => {
                    *inner.table.get_mut(id)? = FileStream::new(fd, flags);
                    log::debug!("reopen {:?} as {} ({}) -> {:?}", old.fd, path, mode, fd);
                    Ok(handle)
                }
                Err(err) => {
                    inner.table.release(id)?;
                    Err(err)
                }
            }
        })
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    /// Write bytes; returns the number written.
    pub fn write(&self, handle: Handle, data: &[u8]) -> StdioResult<usize> {
        self.with(|inner| inner.write(handle, data))
    }

    /// Write `data` as items of `item_size` bytes; returns whole items written.
    pub fn write_items(&self, handle: Handle, data: &[u8], item_size: usize) -> StdioResult<usize> {
        if item_size == 0 {
            return Ok(0);
        }
        let whole = data.len() - data.len() % item_size;
        let written = self.write(handle, &data[..whole])?;
        Ok(written / item_size)
    }

    /// Write one byte.
    pub fn write_byte(&self, handle: Handle, byte: u8) -> StdioResult<u8> {
        match self.write(handle, &[byte])? {
            1 => Ok(byte),
            _ => Err(self.latch(StdioError::Io(FsError::Io))),
        }
    }

    /// Render `args` and write the result; returns the number of bytes.
    pub fn formatted_write(&self, handle: Handle, args: fmt::Arguments<'_>) -> StdioResult<usize> {
        let rendered = FormatBuffer::render(self.config.format_capacity, args)
            .map_err(|err| self.latch(err))?;
        self.write(handle, rendered.as_bytes())
    }

    /// Nothing is buffered below the stream layer.
    pub fn flush(&self, _handle: Handle) -> StdioResult<()> {
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Read into `buf`; returns fewer bytes than requested only at end of stream.
    pub fn read(&self, handle: Handle, buf: &mut [u8]) -> StdioResult<usize> {
        self.with(|inner| inner.read(handle, buf))
    }

    /// Read items of `item_size` bytes; returns whole items read.
    pub fn read_items(&self, handle: Handle, buf: &mut [u8], item_size: usize) -> StdioResult<usize> {
        if item_size == 0 {
            return Ok(0);
        }
        let whole = buf.len() - buf.len() % item_size;
        let read = self.read(handle, &mut buf[..whole])?;
        Ok(read / item_size)
    }

    /// Read one byte; `None` at end of stream.
    pub fn read_byte(&self, handle: Handle) -> StdioResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(handle, &mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read a line of at most `max - 1` bytes, keeping the newline.
    ///
    /// Appends to `line`; `None` when the stream was already at its end.
    pub fn read_line(&self, handle: Handle, line: &mut Vec<u8>, max: usize) -> StdioResult<Option<usize>> {
        let mut count = 0;
        while count + 1 < max {
            let byte = match self.read_byte(handle)? {
                Some(byte) => byte,
                None => break,
            };
            line.try_reserve(1)
                .map_err(|_| self.latch(StdioError::AllocationFailure))?;
            line.push(byte);
            count += 1;
            if byte == b'\n' {
                break;
            }
        }
        Ok(if count == 0 { None } else { Some(count) })
    }

    // ------------------------------------------------------------------------
    // Positioning
    // ------------------------------------------------------------------------

    /// Move the position of a file stream; returns the new offset.
    pub fn seek(&self, handle: Handle, offset: i64, whence: Whence) -> StdioResult<u64> {
        self.with(|inner| inner.seek(handle, offset, whence))
    }

    /// Current position of a file stream.
    pub fn tell(&self, handle: Handle) -> StdioResult<u64> {
        self.seek(handle, 0, Whence::Current)
    }

    /// Whether the position is at (or past) the end of the stream.
    ///
    /// Standard streams are always at end. The position is restored.
    pub fn at_end(&self, handle: Handle) -> StdioResult<bool> {
        self.with(|inner| {
            if handle.is_std() {
                return Ok(true);
            }
            let pos = inner.seek(handle, 0, Whence::Current)?;
            let end = inner.seek(handle, 0, Whence::End)?;
            let pos_i64 = i64::try_from(pos).map_err(|_| StdioError::Io(FsError::InvalidArgument))?;
            inner.seek(handle, pos_i64, Whence::Start)?;
            Ok(pos >= end)
        })
    }

    /// Error indicator of a stream. Errors are not latched per stream, so
    /// this always reports "no error"; see [`Stdio::last_error`].
    pub fn error_flag(&self, _handle: Handle) -> bool {
        false
    }

    fn latch(&self, err: StdioError) -> StdioError {
        self.lock().last_error = Some(err);
        err
    }
}

impl<F: FileSystem, C: Console> Inner<F, C> {
    fn write(&mut self, handle: Handle, data: &[u8]) -> StdioResult<usize> {
        match handle {
            Handle::Std(StdStream::Stdin) => Err(StdioError::UnsupportedOperation),
            Handle::Std(_) => {
                for &c in data {
                    self.console.put_char(c);
                }
                Ok(data.len())
            }
            Handle::File(id) => {
                let fd = self.table.get(id)?.fd;
                let written = self.fs.write(fd, data)?;
                self.table.get_mut(id)?.record_write(written);
                Ok(written)
            }
        }
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> StdioResult<usize> {
        match handle {
            // No interactive input
            Handle::Std(_) => Ok(0),
            Handle::File(id) => {
                let fd = self.table.get(id)?.fd;
                let mut total = 0;
                while total < buf.len() {
                    let n = self.fs.read(fd, &mut buf[total..])?;
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                self.table.get_mut(id)?.record_read(total);
                Ok(total)
            }
        }
    }

    fn seek(&mut self, handle: Handle, offset: i64, whence: Whence) -> StdioResult<u64> {
        match handle {
            Handle::Std(_) => Err(StdioError::UnsupportedOperation),
            Handle::File(id) => {
                let fd = self.table.get(id)?.fd;
                Ok(self.fs.lseek(fd, offset, whence)?)
            }
        }
    }
}

impl<F, C> fmt::Debug for Stdio<F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stdio").field("config", &self.config).finish_non_exhaustive()
    }
}

/// `fprintf`-style formatted write on a [`Stdio`] context.
#[macro_export]
macro_rules! fprintf {
    ($stdio:expr, $handle:expr, $($arg:tt)*) => {
        $stdio.formatted_write($handle, format_args!($($arg)*))
    };
}

// ============================================================================
// Tests
// ============================================================================
