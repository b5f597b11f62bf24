use crate::{HEADER_SIZE, MAX_TABLE_ENTRIES, TABLE_ENTRY_SIZE, TABLE_OFFSET};
use alloc::vec::Vec;
use core::iter::FusedIterator;

#[allow(clippy::cast_possible_truncation)]
const HEADER_LEN: u32 = HEADER_SIZE as u32;

/// Size table of a multi-image container.
///
/// Holds the non-zero lengths in file order. The zero terminator is not
/// stored; [`Self::is_terminated`] records whether one was consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeTable {
    lengths: Vec<u32>,
    terminated: bool,
}

impl SizeTable {
    /// Build a table by pulling entries from `next`, which receives the entry
    /// index and returns the host-order value.
    ///
    /// Reading stops at the first zero or after [`MAX_TABLE_ENTRIES`] non-zero
    /// entries. `next` is never asked for an index past the cap.
    ///
    /// # Errors
    /// The first error returned by `next` is passed through unchanged.
    pub fn read_with<E, F>(mut next: F) -> Result<Self, E>
    where
        F: FnMut(usize) -> Result<u32, E>,
    {
        let mut lengths = Vec::new();
        for index in 0..MAX_TABLE_ENTRIES {
            let value = next(index)?;
            if value == 0 {
                return Ok(Self {
                    lengths,
                    terminated: true,
                });
            }
            lengths.push(value);
        }

        Ok(Self {
            lengths,
            terminated: false,
        })
    }

    /// Parse a table from the big-endian words at the start of `bytes`.
    ///
    /// Returns `None` if `bytes` ends before the table does.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Self::read_with(|index| {
            let off = index * TABLE_ENTRY_SIZE;
            bytes
                .get(off..off + TABLE_ENTRY_SIZE)
                .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
                .ok_or(())
        })
        .ok()
    }

    /// Non-zero lengths in extraction order.
    #[must_use]
    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Whether a zero terminator was consumed. `false` only when the table hit
    /// the entry cap.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Bytes occupied on disk, terminator included.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        let words = self.lengths.len() + usize::from(self.terminated);
        (words * TABLE_ENTRY_SIZE) as u64
    }

    /// Absolute offset of the first sub-image.
    #[must_use]
    pub fn data_offset(&self) -> u64 {
        TABLE_OFFSET + self.encoded_len()
    }

    /// Sum of all declared lengths.
    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.lengths.iter().map(|&l| u64::from(l)).sum()
    }

    /// Sub-image descriptors in table order.
    #[must_use]
    pub fn sub_images(&self) -> SubImages<'_> {
        SubImages {
            lengths: &self.lengths,
            index: 0,
            cursor: self.data_offset(),
        }
    }
}

/// Placement of one embedded image within the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubImage {
    /// Position in the size table.
    pub index: usize,

    /// Absolute offset of the embedded header.
    pub offset: u64,

    /// Full extent from the size table, embedded header included.
    pub declared_length: u32,
}

impl SubImage {
    /// Absolute offset of the payload that follows the embedded header.
    #[must_use]
    pub fn payload_offset(&self) -> u64 {
        self.offset + u64::from(HEADER_LEN)
    }

    /// Payload length, or `None` if the declared length cannot hold a header.
    #[must_use]
    pub fn payload_length(&self) -> Option<u32> {
        self.declared_length.checked_sub(HEADER_LEN)
    }

    /// First byte past this sub-image.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.declared_length)
    }
}

/// Iterator over [`SubImage`]s, laid out back to back.
pub struct SubImages<'a> {
    lengths: &'a [u32],
    index: usize,
    cursor: u64,
}

impl Iterator for SubImages<'_> {
    type Item = SubImage;

    fn next(&mut self) -> Option<Self::Item> {
        let &declared_length = self.lengths.get(self.index)?;
        let sub = SubImage {
            index: self.index,
            offset: self.cursor,
            declared_length,
        };
        self.index += 1;
        self.cursor = sub.end();
        Some(sub)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let r = self.lengths.len().saturating_sub(self.index);
        (r, Some(r))
    }
}

impl ExactSizeIterator for SubImages<'_> {}
impl FusedIterator for SubImages<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn stops_at_terminator() {
        let mut bytes = words(&[100, 200, 0]);
        bytes.extend_from_slice(&words(&[999]));
        let table = SizeTable::parse(&bytes).unwrap();
        assert_eq!(table.lengths(), &[100, 200]);
        assert!(table.is_terminated());
        assert_eq!(table.encoded_len(), 12);
        assert_eq!(table.data_offset(), 64 + 12);
    }

    #[test]
    fn empty_table() {
        let table = SizeTable::parse(&words(&[0])).unwrap();
        assert!(table.is_empty());
        assert!(table.is_terminated());
        assert_eq!(table.data_offset(), 68);
        assert_eq!(table.sub_images().count(), 0);
    }

    #[test]
    fn cap_without_terminator_never_reads_past_sixteen() {
        let mut requested = vec![];
        let table = SizeTable::read_with(|index| {
            requested.push(index);
            Ok::<_, ()>(u32::try_from(index).unwrap() + 64)
        })
        .unwrap();

        assert_eq!(table.len(), MAX_TABLE_ENTRIES);
        assert!(!table.is_terminated());
        assert_eq!(requested, (0..MAX_TABLE_ENTRIES).collect::<Vec<_>>());
        assert_eq!(table.data_offset(), 64 + 4 * 16);
    }

    #[test]
    fn read_error_is_passed_through() {
        let result = SizeTable::read_with(|index| if index < 2 { Ok(80) } else { Err(index) });
        assert_eq!(result, Err(2));
    }

    #[test]
    fn short_buffer_fails_to_parse() {
        assert_eq!(SizeTable::parse(&words(&[100, 200])[..7]), None);
    }

    #[test]
    fn sub_images_are_contiguous() {
        let table = SizeTable::parse(&words(&[100, 70, 64, 0])).unwrap();
        let subs: Vec<_> = table.sub_images().collect();
        let base = 64 + 4 * 4;
        assert_eq!(
            subs,
            vec![
                SubImage { index: 0, offset: base, declared_length: 100 },
                SubImage { index: 1, offset: base + 100, declared_length: 70 },
                SubImage { index: 2, offset: base + 170, declared_length: 64 },
            ]
        );
        assert_eq!(subs[0].payload_offset(), base + 64);
        assert_eq!(subs[0].payload_length(), Some(36));
        assert_eq!(subs[2].payload_length(), Some(0));
        assert_eq!(table.total_length(), 234);
    }

    #[test]
    fn undersized_entry_has_no_payload() {
        let sub = SubImage {
            index: 0,
            offset: 72,
            declared_length: 10,
        };
        assert_eq!(sub.payload_length(), None);
    }
}
