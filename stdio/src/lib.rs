//! # Helix Stdio - C stream layer over a flash filesystem
//!
//! Gives an embedded scripting runtime the `fopen`/`fread`/`fprintf` family
//! on a target that has no C library: standard streams go to the console,
//! file streams go to a [`FileSystem`] by descriptor.
//!
//! ```text
//!   runtime ──► Stdio ──┬── Std(Stdout|Stderr) ──► Console::put_char
//!                       │
//!                       └── File(FileId) ──► HandleTable ──► FileSystem(fd)
//! ```
//!
//! Handles are generation-checked, so a stream used after `close` is
//! rejected with [`StdioError::BadHandle`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod console;
pub mod error;
pub mod format;
pub mod fs;
pub mod handle;
pub mod mode;
#[cfg(any(test, feature = "ramfs"))]
pub mod ramfs;
pub mod stream;

pub use crate::console::{Console, ConsoleFn, NullConsole};
pub use crate::error::{StdioError, StdioResult};
pub use crate::format::{FormatBuffer, DEFAULT_FORMAT_CAPACITY};
pub use crate::fs::{Fd, FileSystem, FsError, FsResult, Whence, DEFAULT_PERMISSIONS};
pub use crate::handle::{FileId, FileStream, Handle, HandleTable, StdStream, MAX_FILE_STREAMS};
pub use crate::mode::{parse_mode, AccessFlags, ModeState};
#[cfg(any(test, feature = "ramfs"))]
pub use crate::ramfs::RamFs;
pub use crate::stream::{Stdio, StdioConfig};
