//! # Legacy Firmware Image Layout
//!
//! Byte-exact definitions for the legacy 64-byte firmware image header and
//! the size table of a multi-image container.
//!
//! A multi-image container is laid out as:
//!
//! ```text
//! 0x00  ┌──────────────────────────────┐
//!       │ ContainerHeader (64 bytes)   │  image_type = 4
//! 0x40  ├──────────────────────────────┤
//!       │ size table: u32 BE × k       │  k ≤ 16, zero-terminated
//!       │ 0x0000_0000 (if k < 16)      │
//!       ├──────────────────────────────┤
//!       │ sub-image 0                  │  ContainerHeader + payload
//!       ├──────────────────────────────┤
//!       │ sub-image 1                  │
//!       │ ...                          │
//!       └──────────────────────────────┘
//! ```
//!
//! All multi-byte integers are stored big-endian and are converted to host
//! order on decode. Decoding always works on raw byte buffers; nothing here
//! reinterprets memory.

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod crc;
mod header;
mod kinds;
#[cfg(feature = "alloc")]
mod table;

pub use header::{ContainerHeader, HeaderError, NAME_LEN};
pub use kinds::{Arch, Compression, ImageType, Os};
#[cfg(feature = "alloc")]
pub use table::{SizeTable, SubImage, SubImages};

/// Magic value found in the first word of a well-formed image header.
///
/// Decoding never checks it; see [`ContainerHeader::has_valid_magic`].
pub const IMAGE_MAGIC: u32 = 0x2705_1956;

/// Size of the fixed header record, in bytes.
pub const HEADER_SIZE: usize = 64;

/// Size of one size-table entry, in bytes.
pub const TABLE_ENTRY_SIZE: usize = 4;

/// Maximum number of non-zero entries in a multi-image size table.
pub const MAX_TABLE_ENTRIES: usize = 16;

/// Offset of the size table from the start of the container.
pub const TABLE_OFFSET: u64 = HEADER_SIZE as u64;
