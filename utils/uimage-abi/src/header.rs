use crate::crc::crc32;
use crate::kinds::{Arch, Compression, ImageType, Os};
use crate::{HEADER_SIZE, IMAGE_MAGIC};
use utils_setters_derive::Setters;

/// Width of the fixed name buffer.
pub const NAME_LEN: usize = 32;

const OFF_MAGIC: usize = 0;
const OFF_HEADER_CRC: usize = 4;
const OFF_TIMESTAMP: usize = 8;
const OFF_SIZE: usize = 12;
const OFF_LOAD: usize = 16;
const OFF_ENTRY: usize = 20;
const OFF_DATA_CRC: usize = 24;
const OFF_OS: usize = 28;
const OFF_ARCH: usize = 29;
const OFF_TYPE: usize = 30;
const OFF_COMP: usize = 31;
const OFF_NAME: usize = 32;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum HeaderError {
    #[error("Header truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Decoded legacy image header with every integer in host byte order.
///
/// The same record describes a multi-image container and each image
/// embedded in it.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Setters)]
pub struct ContainerHeader {
    /// Format identifier, expected to be [`IMAGE_MAGIC`]. Not checked on decode.
    pub magic: u32,

    /// CRC-32 of the header with this field zeroed.
    pub header_crc: u32,

    /// Creation time, seconds since the Unix epoch.
    pub timestamp: u32,

    /// Payload length in bytes. For embedded images this is informational;
    /// the container's size table decides how much is copied.
    pub size: u32,

    pub load_address: u32,
    pub entry_point: u32,

    /// CRC-32 of the payload.
    pub data_crc: u32,

    pub os: Os,
    pub arch: Arch,
    pub image_type: ImageType,
    pub compression: Compression,

    /// Human-readable label. NUL-padded, but a full 32-byte name carries no
    /// terminator at all.
    #[setters(bytes)]
    pub name: [u8; NAME_LEN],
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self {
            magic: IMAGE_MAGIC,
            header_crc: 0,
            timestamp: 0,
            size: 0,
            load_address: 0,
            entry_point: 0,
            data_crc: 0,
            os: Os::default(),
            arch: Arch::default(),
            image_type: ImageType::default(),
            compression: Compression::default(),
            name: [0; NAME_LEN],
        }
    }
}

#[inline]
fn read_u32_be(buf: &[u8; HEADER_SIZE], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[inline]
fn write_u32_be(buf: &mut [u8; HEADER_SIZE], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_be_bytes());
}

impl ContainerHeader {
    /// Decode a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Trailing bytes are ignored.
    ///
    /// # Errors
    /// Returns [`HeaderError::Truncated`] if fewer than [`HEADER_SIZE`] bytes
    /// are supplied.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        let raw = bytes
            .get(..HEADER_SIZE)
            .and_then(|s| <&[u8; HEADER_SIZE]>::try_from(s).ok())
            .ok_or(HeaderError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self::from_bytes(raw))
    }

    /// Decode a header from an exactly sized buffer.
    #[must_use]
    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&raw[OFF_NAME..OFF_NAME + NAME_LEN]);

        Self {
            magic: read_u32_be(raw, OFF_MAGIC),
            header_crc: read_u32_be(raw, OFF_HEADER_CRC),
            timestamp: read_u32_be(raw, OFF_TIMESTAMP),
            size: read_u32_be(raw, OFF_SIZE),
            load_address: read_u32_be(raw, OFF_LOAD),
            entry_point: read_u32_be(raw, OFF_ENTRY),
            data_crc: read_u32_be(raw, OFF_DATA_CRC),
            os: Os::from(raw[OFF_OS]),
            arch: Arch::from(raw[OFF_ARCH]),
            image_type: ImageType::from(raw[OFF_TYPE]),
            compression: Compression::from(raw[OFF_COMP]),
            name,
        }
    }

    /// Encode back into the on-disk layout. Inverse of [`Self::from_bytes`].
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        write_u32_be(&mut raw, OFF_MAGIC, self.magic);
        write_u32_be(&mut raw, OFF_HEADER_CRC, self.header_crc);
        write_u32_be(&mut raw, OFF_TIMESTAMP, self.timestamp);
        write_u32_be(&mut raw, OFF_SIZE, self.size);
        write_u32_be(&mut raw, OFF_LOAD, self.load_address);
        write_u32_be(&mut raw, OFF_ENTRY, self.entry_point);
        write_u32_be(&mut raw, OFF_DATA_CRC, self.data_crc);
        raw[OFF_OS] = self.os.code();
        raw[OFF_ARCH] = self.arch.code();
        raw[OFF_TYPE] = self.image_type.code();
        raw[OFF_COMP] = self.compression.code();
        raw[OFF_NAME..OFF_NAME + NAME_LEN].copy_from_slice(&self.name);
        raw
    }

    /// Name bytes up to the first NUL, never past the 32-byte buffer.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        &self.name[..end]
    }

    /// [`Self::name_bytes`] as text, with invalid UTF-8 replaced.
    #[cfg(feature = "alloc")]
    #[must_use]
    pub fn name_lossy(&self) -> alloc::borrow::Cow<'_, str> {
        alloc::string::String::from_utf8_lossy(self.name_bytes())
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.image_type == ImageType::Multi
    }

    #[must_use]
    pub const fn has_valid_magic(&self) -> bool {
        self.magic == IMAGE_MAGIC
    }

    /// CRC-32 over the encoded header with the checksum field zeroed.
    #[must_use]
    pub fn compute_header_crc(&self) -> u32 {
        let mut raw = self.to_bytes();
        write_u32_be(&mut raw, OFF_HEADER_CRC, 0);
        crc32(&raw)
    }

    #[must_use]
    pub fn header_crc_matches(&self) -> bool {
        self.compute_header_crc() == self.header_crc
    }

    /// Returns a copy with [`Self::header_crc`] set to the computed value.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.header_crc = self.compute_header_crc();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(&[0x27, 0x05, 0x19, 0x56]);
        raw[4..8].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        raw[8..12].copy_from_slice(&[0x5F, 0x00, 0x00, 0x01]);
        raw[12..16].copy_from_slice(&[0x00, 0x01, 0x02, 0x03]);
        raw[16..20].copy_from_slice(&[0x80, 0x00, 0x80, 0x00]);
        raw[20..24].copy_from_slice(&[0x80, 0x00, 0x80, 0x40]);
        raw[24..28].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        raw[28] = 5;
        raw[29] = 2;
        raw[30] = 4;
        raw[31] = 0x7F;
        raw[32..37].copy_from_slice(b"outer");
        raw
    }

    #[test]
    fn decode_normalizes_big_endian_fields() {
        let h = ContainerHeader::decode(&sample()).unwrap();
        assert_eq!(h.magic, IMAGE_MAGIC);
        assert!(h.has_valid_magic());
        assert_eq!(h.header_crc, 0xDEAD_BEEF);
        assert_eq!(h.timestamp, 0x5F00_0001);
        assert_eq!(h.size, 0x0001_0203);
        assert_eq!(h.load_address, 0x8000_8000);
        assert_eq!(h.entry_point, 0x8000_8040);
        assert_eq!(h.data_crc, 0x0102_0304);
        assert_eq!(h.os, Os::Linux);
        assert_eq!(h.arch, Arch::Arm);
        assert_eq!(h.image_type, ImageType::Multi);
        assert!(h.is_multi());
        assert_eq!(h.compression, Compression::Other(0x7F));
        assert_eq!(h.name_bytes(), b"outer");
    }

    #[test]
    fn decode_then_encode_reproduces_bytes() {
        let raw = sample();
        let h = ContainerHeader::decode(&raw).unwrap();
        assert_eq!(h.to_bytes(), raw);

        let mut noisy = [0u8; HEADER_SIZE];
        for (i, b) in noisy.iter_mut().enumerate() {
            *b = u8::try_from(i * 37 % 251).unwrap();
        }
        assert_eq!(ContainerHeader::from_bytes(&noisy).to_bytes(), noisy);
    }

    #[test]
    fn short_input_is_truncated() {
        let raw = sample();
        assert_eq!(
            ContainerHeader::decode(&raw[..40]),
            Err(HeaderError::Truncated {
                expected: HEADER_SIZE,
                actual: 40
            })
        );
        assert!(ContainerHeader::decode(&[]).is_err());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut long = std::vec::Vec::from(sample());
        long.extend_from_slice(&[0xFF; 16]);
        assert_eq!(
            ContainerHeader::decode(&long).unwrap(),
            ContainerHeader::from_bytes(&sample())
        );
    }

    #[test]
    fn unterminated_name_is_bounded() {
        let mut raw = sample();
        raw[32..64].fill(b'A');
        let h = ContainerHeader::decode(&raw).unwrap();
        assert_eq!(h.name_bytes().len(), NAME_LEN);
        assert!(h.name_bytes().iter().all(|&b| b == b'A'));
    }

    #[test]
    fn name_stops_at_first_nul() {
        let h = ContainerHeader::default().with_name(b"ab\0cd");
        assert_eq!(h.name_bytes(), b"ab");
        assert_eq!(h.name_lossy(), "ab");
    }

    #[test]
    fn name_setter_truncates_to_buffer() {
        let long = [b'x'; 40];
        let h = ContainerHeader::default().with_name(&long);
        assert_eq!(h.name, [b'x'; NAME_LEN]);
    }

    #[test]
    fn header_crc_ignores_its_own_field() {
        let h = ContainerHeader::default()
            .with_image_type(ImageType::Kernel)
            .with_size(1234)
            .with_name(b"kernel")
            .sealed();
        assert!(h.header_crc_matches());
        assert_eq!(h.with_header_crc(0).compute_header_crc(), h.header_crc);
        assert!(!h.with_size(1235).header_crc_matches());
    }
}
