use crate::error::IntegrityError;
use crate::options::Validation;
use uimage_abi::ContainerHeader;

/// Apply the enabled header checks to a header read at `offset`.
pub(crate) fn check_header(
    header: &ContainerHeader,
    offset: u64,
    validation: Validation,
) -> Result<(), IntegrityError> {
    if validation.magic && !header.has_valid_magic() {
        return Err(IntegrityError::BadMagic {
            offset,
            found: header.magic,
        });
    }

    if validation.header_crc {
        let computed = header.compute_header_crc();
        if computed != header.header_crc {
            return Err(IntegrityError::HeaderChecksum {
                offset,
                stored: header.header_crc,
                computed,
            });
        }
    }

    Ok(())
}
