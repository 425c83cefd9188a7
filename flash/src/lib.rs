//! # Helix Flash - chunk/tag glue for NOR flash
//!
//! Makes a raw, memory-mapped NOR part usable by a log-structured flash
//! filesystem that speaks in chunks and tags.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Flash filesystem (external)                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   FlashDriver contract        │   Glue (lock, errno, trace)      │
//! ├───────────────────────────────┴─────────────────────────────────┤
//! │                       FlashDevice adapter                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐               │
//! │  │  Geometry   │ │  Tag Codec  │ │ Block State │               │
//! │  └─────────────┘ └─────────────┘ └─────────────┘               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │              NorMedium (MemoryNor / MappedNor)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## On-Flash Format
//!
//! ```text
//! chunk  = data region (512 bytes) + tag region (16 bytes, in-band)
//! block  = 248 chunks, fits one 128 KiB erase sector
//! device = 256 blocks on a 32 MiB part, 5 reserved for GC
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

#[macro_use]
pub mod glue;

pub mod adapter;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod medium;
pub mod tags;

pub use crate::adapter::{FlashDevice, FlashStats, FlashStatsSnapshot};
pub use crate::driver::{Attached, BlockInfo, BlockState, DeviceParams, FlashDriver};
pub use crate::error::{FlashError, FlashResult};
pub use crate::geometry::{ChunkAddr, Geometry};
pub use crate::glue::{Glue, TraceMask};
pub use crate::medium::{MappedNor, MemoryNor, NorMedium};
pub use crate::tags::TagRecord;
