use crate::error::WalkError;
use crate::source::BlockSource;
use log::trace;
use uimage_abi::{SizeTable, TABLE_ENTRY_SIZE};

/// Read the size table that starts at `offset`.
///
/// Entries are read one word at a time, so a table that ends in a terminator
/// never reads past it and a capped table never reads a 17th word.
///
/// # Errors
/// Any failed read is fatal and reported as [`WalkError::Io`] with the
/// offset of the entry that could not be read.
pub fn read_table<S: BlockSource + ?Sized>(source: &S, offset: u64) -> Result<SizeTable, WalkError> {
    SizeTable::read_with(|index| {
        let at = offset + (index * TABLE_ENTRY_SIZE) as u64;
        let mut word = [0u8; TABLE_ENTRY_SIZE];
        source
            .read_at(at, &mut word)
            .map_err(|e| WalkError::Io {
                offset: at,
                length: TABLE_ENTRY_SIZE,
                source: e,
            })?;

        let value = u32::from_be_bytes(word);
        trace!("Size table entry {index} at {at:#x}: {value}");
        Ok(value)
    })
}
