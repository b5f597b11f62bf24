//! # Sub-Image Extraction
//!
//! Copies one embedded image's payload out of the container. The size table
//! entry is authoritative for the extent; the embedded header's own `size`
//! field is only compared against it.

use crate::error::{ExtractError, IntegrityError};
use crate::options::ExtractOptions;
use crate::sink::ArtifactSink;
use crate::source::{BlockSource, HeaderFault, read_header};
use crate::validate::check_header;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::io::Write;
use uimage_abi::crc::Crc32;
use uimage_abi::{ContainerHeader, HEADER_SIZE, SubImage};

/// A successfully written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Position in the size table.
    pub index: usize,
    /// Absolute offset of the embedded header.
    pub offset: u64,
    /// Artifact name, suffix included.
    pub name: String,
    /// The embedded header.
    pub header: ContainerHeader,
    /// Payload bytes written.
    pub bytes_written: u64,
}

/// Derive a file-safe artifact name from an embedded header.
///
/// Only the bytes before the first NUL (at most 32) are used. Bytes outside
/// printable ASCII and path separators become `_`; an empty name, `.` or
/// `..` becomes `image<index>`.
#[must_use]
pub fn artifact_name(header: &ContainerHeader, index: usize, suffix: &str) -> String {
    with_suffix(artifact_stem(header, index), suffix)
}

fn artifact_stem(header: &ContainerHeader, index: usize) -> String {
    let base: String = header
        .name_bytes()
        .iter()
        .map(|&b| match b {
            b'/' | b'\\' => '_',
            0x20..=0x7E => char::from(b),
            _ => '_',
        })
        .collect();

    match base.trim() {
        "" | "." | ".." => format!("image{index}"),
        _ => base,
    }
}

fn with_suffix(stem: String, suffix: &str) -> String {
    if suffix.is_empty() {
        stem
    } else {
        format!("{stem}.{suffix}")
    }
}

/// Artifact names already handed out during one walk.
///
/// A sub-image whose name was taken by an earlier entry gets `-<index>`
/// appended to its stem, so every entry lands in its own artifact.
#[derive(Debug, Default, Clone)]
pub(crate) struct IssuedNames {
    names: BTreeSet<String>,
}

impl IssuedNames {
    /// Reserve a name for sub-image `index` and return it.
    pub(crate) fn claim(
        &mut self,
        header: &ContainerHeader,
        index: usize,
        suffix: &str,
    ) -> String {
        let stem = artifact_stem(header, index);
        let mut name = with_suffix(stem.clone(), suffix);
        let mut attempt = 0usize;
        while self.names.contains(&name) {
            let unique = if attempt == 0 {
                format!("{stem}-{index}")
            } else {
                format!("{stem}-{index}-{attempt}")
            };
            name = with_suffix(unique, suffix);
            attempt += 1;
        }

        if attempt > 0 {
            warn!("Sub-image {index}: artifact name already used, writing to {name}");
        }
        self.names.insert(name.clone());
        name
    }
}

/// Read the embedded header of `sub` without extracting anything.
///
/// # Errors
/// [`ExtractError::TruncatedHeader`] if the source ends inside the header,
/// [`ExtractError::Io`] if the read fails.
pub fn inspect<S: BlockSource + ?Sized>(
    source: &S,
    sub: SubImage,
) -> Result<ContainerHeader, ExtractError> {
    read_header(source, sub.offset).map_err(|fault| match fault {
        HeaderFault::Truncated { available } => ExtractError::TruncatedHeader {
            index: sub.index,
            offset: sub.offset,
            expected: HEADER_SIZE,
            available,
        },
        HeaderFault::Io(e) => ExtractError::Io {
            index: sub.index,
            offset: sub.offset,
            length: HEADER_SIZE,
            source: e,
        },
    })
}

/// Extract the payload of `sub` into a new artifact in `sink`.
///
/// The declared length is checked before anything is read, and the payload
/// extent is checked against the source length before the artifact is
/// created, so the size errors never leave an artifact behind.
///
/// # Errors
/// - [`ExtractError::InvalidSubImageSize`] if the declared length cannot hold
///   an embedded header.
/// - [`ExtractError::TruncatedHeader`] / [`ExtractError::Io`] if the embedded
///   header cannot be read.
/// - [`ExtractError::TruncatedCopy`] if the payload runs past the source or
///   a read or write fails mid-copy.
/// - [`ExtractError::Create`] if the artifact cannot be created.
/// - [`ExtractError::Flush`] if the fully written artifact cannot be flushed.
/// - [`ExtractError::Integrity`] if an enabled validation fails. A data
///   checksum failure is reported after the artifact has been written.
pub fn extract<S, K>(
    source: &S,
    sink: &mut K,
    sub: SubImage,
    options: &ExtractOptions,
) -> Result<Extracted, ExtractError>
where
    S: BlockSource + ?Sized,
    K: ArtifactSink + ?Sized,
{
    extract_named(source, sink, sub, options, |header| {
        artifact_name(header, sub.index, options.suffix())
    })
}

/// [`extract`] with the artifact name chosen by `name_for` once the embedded
/// header is known.
pub(crate) fn extract_named<S, K, F>(
    source: &S,
    sink: &mut K,
    sub: SubImage,
    options: &ExtractOptions,
    name_for: F,
) -> Result<Extracted, ExtractError>
where
    S: BlockSource + ?Sized,
    K: ArtifactSink + ?Sized,
    F: FnOnce(&ContainerHeader) -> String,
{
    let Some(payload_length) = sub.payload_length().map(u64::from) else {
        return Err(ExtractError::InvalidSubImageSize {
            index: sub.index,
            offset: sub.offset,
            declared_length: sub.declared_length,
            minimum: HEADER_SIZE,
        });
    };

    let header = inspect(source, sub)?;
    debug!(
        "Sub-image {} at {:#x}: name {:?}, type {}, size {}",
        sub.index,
        sub.offset,
        header.name_lossy(),
        header.image_type,
        header.size
    );

    check_header(&header, sub.offset, options.validation()).map_err(|source| {
        ExtractError::Integrity {
            index: sub.index,
            source,
        }
    })?;

    if u64::from(header.size) != payload_length {
        warn!(
            "Sub-image {}: embedded header declares {} payload bytes, size table allows {payload_length}; using the size table",
            sub.index, header.size
        );
    }

    let name = name_for(&header);
    let payload_offset = sub.payload_offset();

    let available = source.len().saturating_sub(payload_offset);
    if available < payload_length {
        return Err(ExtractError::TruncatedCopy {
            index: sub.index,
            name,
            offset: payload_offset,
            expected: payload_length,
            copied: 0,
            source: None,
        });
    }

    let mut writer = sink.create(&name).map_err(|e| ExtractError::Create {
        index: sub.index,
        offset: sub.offset,
        name: name.clone(),
        source: e,
    })?;

    let truncated = |copied: u64, e: std::io::Error| ExtractError::TruncatedCopy {
        index: sub.index,
        name: name.clone(),
        offset: payload_offset,
        expected: payload_length,
        copied,
        source: Some(e),
    };

    let block = options.block_size();
    let mut buf = vec![0u8; usize::try_from(payload_length).map_or(block, |len| len.min(block))];
    let mut crc = Crc32::new();
    let mut copied = 0u64;

    while copied < payload_length {
        let remaining = payload_length - copied;
        let n = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let chunk = &mut buf[..n];

        source
            .read_at(payload_offset + copied, chunk)
            .map_err(|e| truncated(copied, e))?;
        writer.write_all(chunk).map_err(|e| truncated(copied, e))?;

        crc.update(chunk);
        copied += n as u64;
    }

    writer.flush().map_err(|e| ExtractError::Flush {
        index: sub.index,
        offset: sub.offset,
        name: name.clone(),
        written: copied,
        source: e,
    })?;
    drop(writer);

    info!(
        "Extracted sub-image {} ({copied} bytes from {payload_offset:#x}) to {name}",
        sub.index
    );

    if options.validation().data_crc {
        let computed = crc.finish();
        if computed != header.data_crc {
            return Err(ExtractError::Integrity {
                index: sub.index,
                source: IntegrityError::DataChecksum {
                    offset: payload_offset,
                    stored: header.data_crc,
                    computed,
                },
            });
        }
    }

    Ok(Extracted {
        index: sub.index,
        offset: sub.offset,
        name,
        header,
        bytes_written: copied,
    })
}
