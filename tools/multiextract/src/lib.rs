//! # Multi-Image Extraction
//!
//! Walks a legacy multi-image firmware container and writes each embedded
//! image's payload to its own artifact.
//!
//! ```text
//! BlockSource ─→ outer header ─→ size table ─→ Walker ─┬─→ extract(0) ─→ ArtifactSink
//!                                                      ├─→ extract(1) ─→ ArtifactSink
//!                                                      └─→ ...
//! ```
//!
//! All reads are positioned, so the walk never depends on a shared stream
//! position. Failures in the outer header or size table abort the walk;
//! failures in one sub-image are handled according to the
//! [`FailurePolicy`].
//!
//! ```
//! use multiextract::{ExtractOptions, MemorySink, walk};
//! use uimage_abi::{ContainerHeader, ImageType};
//!
//! let mut blob = ContainerHeader::default()
//!     .with_image_type(ImageType::Multi)
//!     .to_bytes()
//!     .to_vec();
//! blob.extend_from_slice(&68u32.to_be_bytes());
//! blob.extend_from_slice(&0u32.to_be_bytes());
//! blob.extend_from_slice(&ContainerHeader::default().with_name(b"dtb").to_bytes());
//! blob.extend_from_slice(b"\xd0\x0d\xfe\xed");
//!
//! let mut sink = MemorySink::new();
//! let options = ExtractOptions::default();
//! let summary = walk(&blob, &mut sink, &options)?.run();
//!
//! assert!(summary.is_success());
//! assert_eq!(sink.get("dtb.bin"), Some(b"\xd0\x0d\xfe\xed".as_slice()));
//! # Ok::<(), multiextract::WalkError>(())
//! ```

mod error;
mod extract;
pub mod logger;
mod options;
mod sink;
mod source;
mod table;
mod validate;
mod walker;

pub use error::{ExtractError, IntegrityError, WalkError};
pub use extract::{Extracted, artifact_name, extract, inspect};
pub use options::{
    DEFAULT_BLOCK_SIZE, DEFAULT_SUFFIX, ExtractOptions, FailurePolicy, Validation,
};
pub use sink::{ArtifactSink, DirectorySink, MemorySink};
pub use source::{BlockSource, FileSource, OpenError};
pub use table::read_table;
pub use walker::{Container, WalkSummary, Walker, walk};
