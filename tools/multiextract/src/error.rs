use std::io;
use uimage_abi::ImageType;

/// Optional integrity checks that failed. Only produced when the matching
/// [`crate::Validation`] flag is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("Bad magic {found:#010x} in header at offset {offset:#x} (expected 0x27051956)")]
    BadMagic { offset: u64, found: u32 },
    #[error(
        "Header checksum mismatch at offset {offset:#x}: stored {stored:#010x}, computed {computed:#010x}"
    )]
    HeaderChecksum {
        offset: u64,
        stored: u32,
        computed: u32,
    },
    #[error(
        "Data checksum mismatch for payload at offset {offset:#x}: stored {stored:#010x}, computed {computed:#010x}"
    )]
    DataChecksum {
        offset: u64,
        stored: u32,
        computed: u32,
    },
}

/// Failures that end the walk before any sub-image is touched.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error(
        "Container header truncated at offset {offset:#x}: need {expected} bytes, {available} available"
    )]
    TruncatedHeader {
        offset: u64,
        expected: usize,
        available: u64,
    },
    #[error("Failed to read {length} bytes at offset {offset:#x}")]
    Io {
        offset: u64,
        length: usize,
        #[source]
        source: io::Error,
    },
    #[error("Image type {0} is not a multi-image container")]
    NotMultiImage(ImageType),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

/// Failures scoped to a single sub-image.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(
        "Sub-image {index}: header truncated at offset {offset:#x}: need {expected} bytes, {available} available"
    )]
    TruncatedHeader {
        index: usize,
        offset: u64,
        expected: usize,
        available: u64,
    },
    #[error("Sub-image {index}: failed to read {length} bytes at offset {offset:#x}")]
    Io {
        index: usize,
        offset: u64,
        length: usize,
        #[source]
        source: io::Error,
    },
    #[error(
        "Sub-image {index} at offset {offset:#x}: declared length {declared_length} cannot hold a {minimum}-byte header"
    )]
    InvalidSubImageSize {
        index: usize,
        offset: u64,
        declared_length: u32,
        minimum: usize,
    },
    #[error(
        "Sub-image {index}: copied {copied} of {expected} payload bytes from offset {offset:#x} into {name}"
    )]
    TruncatedCopy {
        index: usize,
        name: String,
        offset: u64,
        expected: u64,
        copied: u64,
        #[source]
        source: Option<io::Error>,
    },
    #[error("Sub-image {index} at offset {offset:#x}: cannot create artifact {name}")]
    Create {
        index: usize,
        offset: u64,
        name: String,
        #[source]
        source: io::Error,
    },
    #[error(
        "Sub-image {index} at offset {offset:#x}: all {written} payload bytes written but artifact {name} could not be flushed"
    )]
    Flush {
        index: usize,
        offset: u64,
        name: String,
        written: u64,
        #[source]
        source: io::Error,
    },
    #[error("Sub-image {index} failed validation")]
    Integrity {
        index: usize,
        #[source]
        source: IntegrityError,
    },
}

impl ExtractError {
    /// Table index of the sub-image that failed.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::TruncatedHeader { index, .. }
            | Self::Io { index, .. }
            | Self::InvalidSubImageSize { index, .. }
            | Self::TruncatedCopy { index, .. }
            | Self::Create { index, .. }
            | Self::Flush { index, .. }
            | Self::Integrity { index, .. } => *index,
        }
    }
}
