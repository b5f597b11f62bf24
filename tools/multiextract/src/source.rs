//! # Block Sources
//!
//! Random-access byte sources addressed by absolute offset. There is no
//! shared stream position, so one source can back any number of independent
//! readers.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use uimage_abi::{ContainerHeader, HEADER_SIZE};

#[derive(Debug, thiserror::Error)]
#[error("Failed to open {}", path.display())]
pub struct OpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Random-access, read-only byte source.
pub trait BlockSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// # Errors
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if fewer than `buf.len()`
    /// bytes are available; a short read is never reported as success.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

fn eof() -> io::Error {
    io::Error::from(io::ErrorKind::UnexpectedEof)
}

impl BlockSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| eof())?;
        let end = start.checked_add(buf.len()).ok_or_else(eof)?;
        let bytes = self.get(start..end).ok_or_else(eof)?;
        buf.copy_from_slice(bytes);
        Ok(())
    }
}

impl BlockSource for Vec<u8> {
    fn len(&self) -> u64 {
        BlockSource::len(self.as_slice())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_at(offset, buf)
    }
}

impl<S: BlockSource + ?Sized> BlockSource for &S {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_at(offset, buf)
    }
}

/// A file or block device opened read-only.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Open `path` for positioned reads.
    ///
    /// # Errors
    /// Returns [`OpenError`] if the file cannot be opened or its length
    /// cannot be determined.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let wrap = |source| OpenError {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(wrap)?;

        // Block devices report a zero length in their metadata.
        let len = file.seek(SeekFrom::End(0)).map_err(wrap)?;
        log::debug!("Opened {} ({len} bytes)", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.seek_read(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(eof());
            }
            filled += n;
        }
        Ok(())
    }
}

/// Why a header could not be read at a given offset.
#[derive(Debug)]
pub(crate) enum HeaderFault {
    /// The source ends less than [`HEADER_SIZE`] bytes after the offset.
    Truncated { available: u64 },
    Io(io::Error),
}

/// Read and decode the header at `offset`.
pub(crate) fn read_header<S: BlockSource + ?Sized>(
    source: &S,
    offset: u64,
) -> Result<ContainerHeader, HeaderFault> {
    let available = source.len().saturating_sub(offset);
    if available < HEADER_SIZE as u64 {
        return Err(HeaderFault::Truncated { available });
    }

    let mut raw = [0u8; HEADER_SIZE];
    source.read_at(offset, &mut raw).map_err(HeaderFault::Io)?;
    Ok(ContainerHeader::from_bytes(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_reads_are_exact() {
        let data: Vec<u8> = (0..16).collect();
        let mut buf = [0u8; 4];
        data.read_at(6, &mut buf).unwrap();
        assert_eq!(buf, [6, 7, 8, 9]);

        data.read_at(12, &mut buf).unwrap();
        assert_eq!(buf, [12, 13, 14, 15]);
    }

    #[test]
    fn short_slice_read_is_an_error() {
        let data = [1u8, 2, 3];
        let mut buf = [0u8; 4];
        let err = data.as_slice().read_at(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = data.as_slice().read_at(u64::MAX, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn header_past_end_is_truncated() {
        let data = vec![0u8; 100];
        assert!(read_header(&data, 0).is_ok());
        assert!(read_header(&data, 36).is_ok());
        match read_header(&data, 40) {
            Err(HeaderFault::Truncated { available }) => assert_eq!(available, 60),
            other => panic!("unexpected {other:?}"),
        }
        match read_header(&data, 500) {
            Err(HeaderFault::Truncated { available }) => assert_eq!(available, 0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn file_source_reads_positioned() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("flash.img");
        std::fs::write(&path, (0u8..=255).collect::<Vec<_>>()).unwrap();

        let source = FileSource::open(&path).unwrap();
        assert_eq!(source.len(), 256);
        assert_eq!(source.path(), path.as_path());
        let mut buf = [0u8; 3];
        source.read_at(250, &mut buf).unwrap();
        assert_eq!(buf, [250, 251, 252]);
        assert!(source.read_at(254, &mut buf).is_err());
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = FileSource::open("/definitely/not/here.img").unwrap_err();
        assert_eq!(err.path, Path::new("/definitely/not/here.img"));
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
    }
}
