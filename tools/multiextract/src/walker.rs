//! # Container Walk
//!
//! ```text
//! Start → HeaderRead → TableRead → ExtractNext* → Done
//!   │          │           │            │
//!   └──────────┴───────────┴────────────┴──→ Failed
//! ```
//!
//! [`Container::read`] covers `Start` through `TableRead`; its errors abort
//! the walk before anything is extracted. [`Walker`] then yields one result
//! per table entry. Under [`FailurePolicy::FailFast`] the first failed entry
//! moves the walker to `Failed`; otherwise the cursor still advances by the
//! failed entry's declared length and the walk continues.
//!
//! Artifact names are unique within one walk: a sub-image whose name was
//! already used by an earlier entry is written as `<name>-<index>.<suffix>`.

use crate::error::{ExtractError, WalkError};
use crate::extract::{Extracted, IssuedNames, extract_named};
use crate::options::{ExtractOptions, FailurePolicy};
use crate::sink::ArtifactSink;
use crate::source::{BlockSource, HeaderFault, read_header};
use crate::table::read_table;
use crate::validate::check_header;
use log::{debug, error, info, warn};
use uimage_abi::{ContainerHeader, HEADER_SIZE, SizeTable, SubImage, SubImages, TABLE_OFFSET};

/// Outer header and size table of a multi-image container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    header: ContainerHeader,
    table: SizeTable,
}

impl Container {
    /// Read the outer header at offset 0 and the size table after it.
    ///
    /// # Errors
    /// - [`WalkError::TruncatedHeader`] if the source is shorter than a header.
    ///   No table read is attempted.
    /// - [`WalkError::Integrity`] if an enabled header check fails.
    /// - [`WalkError::NotMultiImage`] if the image type is not multi and
    ///   [`ExtractOptions::require_multi`] is set.
    /// - [`WalkError::Io`] if the header or a table entry cannot be read.
    pub fn read<S: BlockSource + ?Sized>(
        source: &S,
        options: &ExtractOptions,
    ) -> Result<Self, WalkError> {
        let header = read_header(source, 0).map_err(|fault| match fault {
            HeaderFault::Truncated { available } => WalkError::TruncatedHeader {
                offset: 0,
                expected: HEADER_SIZE,
                available,
            },
            HeaderFault::Io(e) => WalkError::Io {
                offset: 0,
                length: HEADER_SIZE,
                source: e,
            },
        })?;

        debug!(
            "Container header: magic {:#010x}, type {}, os {}, arch {}, compression {}, name {:?}",
            header.magic,
            header.image_type,
            header.os,
            header.arch,
            header.compression,
            header.name_lossy()
        );

        check_header(&header, 0, options.validation())?;

        if !header.is_multi() {
            if options.require_multi() {
                return Err(WalkError::NotMultiImage(header.image_type));
            }
            warn!(
                "Image type is {}, not multi; reading a size table anyway",
                header.image_type
            );
        }

        let table = read_table(source, TABLE_OFFSET)?;
        if !table.is_terminated() {
            warn!("Size table has no terminator; stopped at the 16-entry cap");
        }

        info!(
            "Container {:?}: {} sub-images, {} bytes declared",
            header.name_lossy(),
            table.len(),
            table.total_length()
        );

        let end = table.data_offset() + table.total_length();
        if end > source.len() {
            warn!(
                "Size table declares {end} bytes but the source holds {}",
                source.len()
            );
        }

        Ok(Self { header, table })
    }

    #[must_use]
    pub const fn header(&self) -> &ContainerHeader {
        &self.header
    }

    #[must_use]
    pub const fn table(&self) -> &SizeTable {
        &self.table
    }

    /// Sub-image placements in extraction order.
    #[must_use]
    pub fn sub_images(&self) -> SubImages<'_> {
        self.table.sub_images()
    }

    /// Start extracting into `sink`.
    #[must_use]
    pub fn walk<'a, S, K>(
        self,
        source: &'a S,
        sink: &'a mut K,
        options: &'a ExtractOptions,
    ) -> Walker<'a, S, K>
    where
        S: BlockSource + ?Sized,
        K: ArtifactSink + ?Sized,
    {
        let cursor = self.table.data_offset();
        Walker {
            container: self,
            source,
            sink,
            options,
            next_index: 0,
            cursor,
            names: IssuedNames::default(),
            state: State::Extracting,
        }
    }
}

/// Read the container in `source` and return a walker over its sub-images.
///
/// # Errors
/// See [`Container::read`].
pub fn walk<'a, S, K>(
    source: &'a S,
    sink: &'a mut K,
    options: &'a ExtractOptions,
) -> Result<Walker<'a, S, K>, WalkError>
where
    S: BlockSource + ?Sized,
    K: ArtifactSink + ?Sized,
{
    Ok(Container::read(source, options)?.walk(source, sink, options))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Extracting,
    Done,
    Failed,
}

/// Lazily extracts each sub-image in table order.
///
/// Yields one result per table entry; finite and not restartable.
pub struct Walker<'a, S: ?Sized, K: ?Sized> {
    container: Container,
    source: &'a S,
    sink: &'a mut K,
    options: &'a ExtractOptions,
    next_index: usize,
    cursor: u64,
    names: IssuedNames,
    state: State,
}

impl<S, K> Walker<'_, S, K>
where
    S: BlockSource + ?Sized,
    K: ArtifactSink + ?Sized,
{
    #[must_use]
    pub const fn container(&self) -> &Container {
        &self.container
    }

    /// Whether a failure stopped the walk early.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == State::Failed
    }

    /// Drain the walker and collect the outcome of every entry.
    #[must_use]
    pub fn run(mut self) -> WalkSummary {
        let mut summary = WalkSummary::default();
        for result in self.by_ref() {
            match result {
                Ok(extracted) => summary.extracted.push(extracted),
                Err(e) => summary.failed.push(e),
            }
        }

        summary.skipped = self.container.table.len() - self.next_index;
        summary.aborted = self.is_failed();
        summary
    }
}

impl<S, K> Iterator for Walker<'_, S, K>
where
    S: BlockSource + ?Sized,
    K: ArtifactSink + ?Sized,
{
    type Item = Result<Extracted, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != State::Extracting {
            return None;
        }

        let Some(&declared_length) = self.container.table.lengths().get(self.next_index) else {
            self.state = State::Done;
            return None;
        };

        let sub = SubImage {
            index: self.next_index,
            offset: self.cursor,
            declared_length,
        };
        self.next_index += 1;
        self.cursor = sub.end();

        let suffix = self.options.suffix();
        let names = &mut self.names;
        let result = extract_named(self.source, &mut *self.sink, sub, self.options, |header| {
            names.claim(header, sub.index, suffix)
        });
        if let Err(e) = &result {
            error!("{e}");
            if self.options.failure_policy() == FailurePolicy::FailFast {
                self.state = State::Failed;
            }
        }

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.state != State::Extracting {
            return (0, Some(0));
        }
        let r = self.container.table.len() - self.next_index;
        (0, Some(r))
    }
}

/// Outcome of a complete walk.
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Successfully written artifacts, in table order.
    pub extracted: Vec<Extracted>,
    /// Failed entries, in table order.
    pub failed: Vec<ExtractError>,
    /// Entries never attempted because the walk stopped early.
    pub skipped: usize,
    /// Whether a fail-fast failure stopped the walk.
    pub aborted: bool,
}

impl WalkSummary {
    /// `true` if every table entry was extracted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use uimage_abi::ImageType;

    fn container(lengths: &[u32], data: &[u8]) -> Vec<u8> {
        let header = ContainerHeader::default()
            .with_image_type(ImageType::Multi)
            .with_name(b"outer");
        let mut bytes = header.to_bytes().to_vec();
        for l in lengths {
            bytes.extend_from_slice(&l.to_be_bytes());
        }
        bytes.extend_from_slice(data);
        bytes
    }

    fn sub_image(name: &[u8], payload_len: usize, fill: u8) -> Vec<u8> {
        let mut bytes = ContainerHeader::default()
            .with_image_type(ImageType::Ramdisk)
            .with_size(u32::try_from(payload_len).unwrap())
            .with_name(name)
            .to_bytes()
            .to_vec();
        bytes.resize(HEADER_SIZE + payload_len, fill);
        bytes
    }

    #[test]
    fn offsets_follow_table_order() {
        let mut data = sub_image(b"a", 10, 1);
        data.extend(sub_image(b"b", 20, 2));
        data.extend(sub_image(b"c", 0, 3));
        let source = container(&[74, 84, 64, 0], &data);

        let c = Container::read(&source, &ExtractOptions::default()).unwrap();
        let offsets: Vec<u64> = c.sub_images().map(|s| s.offset).collect();
        let base = 64 + 4 * 4;
        assert_eq!(offsets, vec![base, base + 74, base + 74 + 84]);

        let mut sink = MemorySink::new();
        let options = ExtractOptions::default();
        let walked: Vec<_> = c.walk(&source, &mut sink, &options).collect();
        let walked_offsets: Vec<u64> = walked.iter().map(|r| r.as_ref().unwrap().offset).collect();
        assert_eq!(walked_offsets, offsets);
        assert_eq!(sink.get("b.bin"), Some([2u8; 20].as_slice()));
    }

    #[test]
    fn walker_is_fused_after_done() {
        let source = container(&[0], &[]);
        let mut sink = MemorySink::new();
        let options = ExtractOptions::default();
        let mut walker = walk(&source, &mut sink, &options).unwrap();
        assert!(walker.next().is_none());
        assert!(walker.next().is_none());
        assert!(!walker.is_failed());
    }

    #[test]
    fn non_multi_is_rejected_unless_allowed() {
        let mut source = container(&[0], &[]);
        source[30] = ImageType::Kernel.code();

        let strict = ExtractOptions::default();
        assert!(matches!(
            Container::read(&source, &strict),
            Err(WalkError::NotMultiImage(ImageType::Kernel))
        ));

        let lenient = ExtractOptions::default().with_require_multi(false);
        assert!(Container::read(&source, &lenient).unwrap().table().is_empty());
    }

    #[test]
    fn fail_fast_stops_after_first_failure() {
        let mut data = vec![0xAB; 10];
        data.extend(sub_image(b"ok", 4, 5));
        let source = container(&[10, 68, 0], &data);

        let mut sink = MemorySink::new();
        let options = ExtractOptions::default().with_failure_policy(FailurePolicy::FailFast);
        let summary = walk(&source, &mut sink, &options).unwrap().run();

        assert_eq!(summary.failed.len(), 1);
        assert!(summary.extracted.is_empty());
        assert_eq!(summary.skipped, 1);
        assert!(summary.aborted);
        assert!(!summary.is_success());
        assert!(sink.is_empty());
    }

    #[test]
    fn duplicate_names_get_distinct_artifacts() {
        let mut data = sub_image(b"kernel", 8, 1);
        data.extend(sub_image(b"kernel", 8, 2));
        data.extend(sub_image(b"kernel", 8, 3));
        let source = container(&[72, 72, 72, 0], &data);

        let mut sink = MemorySink::new();
        let options = ExtractOptions::default();
        let summary = walk(&source, &mut sink, &options).unwrap().run();

        assert!(summary.is_success());
        let names: Vec<&str> = summary.extracted.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["kernel.bin", "kernel-1.bin", "kernel-2.bin"]);
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.get("kernel.bin"), Some([1u8; 8].as_slice()));
        assert_eq!(sink.get("kernel-1.bin"), Some([2u8; 8].as_slice()));
        assert_eq!(sink.get("kernel-2.bin"), Some([3u8; 8].as_slice()));
    }

    #[test]
    fn renamed_duplicate_avoids_a_literal_match() {
        let mut data = sub_image(b"fw", 2, 1);
        data.extend(sub_image(b"fw-2", 2, 2));
        data.extend(sub_image(b"fw", 2, 3));
        let source = container(&[66, 66, 66, 0], &data);

        let mut sink = MemorySink::new();
        let options = ExtractOptions::default();
        let summary = walk(&source, &mut sink, &options).unwrap().run();

        let names: Vec<&str> = summary.extracted.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["fw.bin", "fw-2.bin", "fw-2-1.bin"]);
        assert_eq!(sink.get("fw-2-1.bin"), Some([3u8; 2].as_slice()));
    }

    #[test]
    fn continue_policy_extracts_siblings() {
        let mut data = vec![0xAB; 10];
        data.extend(sub_image(b"ok", 4, 5));
        let source = container(&[10, 68, 0], &data);

        let mut sink = MemorySink::new();
        let options = ExtractOptions::default();
        let summary = walk(&source, &mut sink, &options).unwrap().run();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].index(), 0);
        assert_eq!(summary.extracted.len(), 1);
        assert_eq!(summary.extracted[0].index, 1);
        assert_eq!(summary.skipped, 0);
        assert!(!summary.aborted);
        assert_eq!(sink.get("ok.bin"), Some([5u8; 4].as_slice()));
    }
}
