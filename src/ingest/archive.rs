//! Archive access
//!
//! The pipeline only needs entry names, a directory flag and a way to read
//! one entry's bytes on demand. `ZipSource` provides that over the `zip` crate.

use crate::error::{ClassifierError, Result};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full path inside the archive, `/` separated
    pub name: String,
    pub is_dir: bool,
    index: usize,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, is_dir: bool, index: usize) -> Self {
        Self {
            name: name.into(),
            is_dir,
            index,
        }
    }

    /// Number of path separators in the name
    pub fn depth(&self) -> usize {
        self.name.matches('/').count()
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// An opened archive
pub trait ArchiveSource {
    fn entries(&self) -> &[ArchiveEntry];

    /// Extract one entry's bytes
    fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>>;
}

pub struct ZipSource<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
    entries: Vec<ArchiveEntry>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| ClassifierError::ArchiveUnreadable(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| ClassifierError::ArchiveUnreadable(e.to_string()))?;
            entries.push(ArchiveEntry::new(file.name(), file.is_dir(), index));
        }

        Ok(Self { archive, entries })
    }
}

impl ZipSource<Cursor<Vec<u8>>> {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::new(Cursor::new(bytes))
    }
}

impl ZipSource<std::fs::File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::new(file)
    }
}

impl<R: Read + Seek> ArchiveSource for ZipSource<R> {
    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_index(entry.index)
            .map_err(|e| ClassifierError::ArchiveUnreadable(format!("{}: {}", entry.name, e)))?;

        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| ClassifierError::ArchiveUnreadable(format!("{}: {}", entry.name, e)))?;
        Ok(bytes)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::zip_bytes;
    use super::*;

    #[test]
    fn test_entry_depth() {
        assert_eq!(ArchiveEntry::new("a.png", false, 0).depth(), 0);
        assert_eq!(ArchiveEntry::new("a/b.png", false, 0).depth(), 1);
        assert_eq!(ArchiveEntry::new("a/b/c.png", false, 0).depth(), 2);
    }

    #[test]
    fn test_zip_source_lists_and_reads() {
        let bytes = zip_bytes(&[("dir/", b""), ("dir/TIC_1_a.png", b"png-bytes")]);
        let mut source = ZipSource::from_bytes(bytes).unwrap();

        let entries = source.entries().to_vec();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].name, "dir/TIC_1_a.png");

        let data = source.read_entry(&entries[1]).unwrap();
        assert_eq!(data, b"png-bytes");
    }

    #[test]
    fn test_zip_source_rejects_garbage() {
        let result = ZipSource::from_bytes(b"definitely not a zip".to_vec());
        assert!(matches!(result, Err(ClassifierError::ArchiveUnreadable(_))));
    }
}
