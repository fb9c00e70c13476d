//! File handles the reader consumes.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A log file the reader can open.
///
/// Each call to [`LogFile::open`] yields a fresh stream positioned at the
/// start of the file; the reader consumes one stream per pass and never
/// rewinds it.
pub trait LogFile {
    fn exists(&self) -> bool;

    /// File name used for format selection and error context.
    fn name(&self) -> &str;

    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// A log file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        Self { path, name }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogFile for LocalFile {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// An in-memory log file, for tests and for logs already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    contents: Vec<u8>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

impl LogFile for MemoryFile {
    fn exists(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::Cursor::new(self.contents.clone())))
    }
}
