//! # Artifact Sinks
//!
//! Destinations for extracted payloads. Each artifact is identified by the
//! name derived from its embedded header.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for extracted artifacts.
pub trait ArtifactSink {
    /// Create the artifact `name`, replacing any previous artifact of the
    /// same name.
    ///
    /// The writer is flushed by the caller before it is dropped.
    ///
    /// # Errors
    /// Returns the I/O error that prevented the artifact from being created.
    fn create(&mut self, name: &str) -> io::Result<Box<dyn Write + '_>>;
}

/// Writes artifacts as files in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Use `root` as the output directory. It is not created.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `root` as the output directory, creating it and its parents.
    ///
    /// # Errors
    /// Returns the I/O error from creating the directory.
    pub fn create_dir(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the artifact `name` is written to.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ArtifactSink for DirectorySink {
    fn create(&mut self, name: &str) -> io::Result<Box<dyn Write + '_>> {
        let file = File::create(self.path_of(name))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Keeps artifacts in memory, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    artifacts: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.artifacts.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Vec<u8>> {
        self.artifacts
    }
}

impl ArtifactSink for MemorySink {
    fn create(&mut self, name: &str) -> io::Result<Box<dyn Write + '_>> {
        let buf = self.artifacts.entry(name.to_owned()).or_default();
        buf.clear();
        Ok(Box::new(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_overwrites() {
        let mut sink = MemorySink::new();
        sink.create("a.bin").unwrap().write_all(b"first").unwrap();
        sink.create("a.bin").unwrap().write_all(b"2nd").unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get("a.bin"), Some(b"2nd".as_slice()));
        assert_eq!(sink.names().collect::<Vec<_>>(), vec!["a.bin"]);
    }

    #[test]
    fn directory_sink_writes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("out");
        let mut sink = DirectorySink::create_dir(&root).unwrap();
        {
            let mut w = sink.create("kernel.bin").unwrap();
            w.write_all(&[1, 2, 3]).unwrap();
            w.flush().unwrap();
        }
        assert_eq!(fs::read(sink.path_of("kernel.bin")).unwrap(), vec![1, 2, 3]);
    }
}
