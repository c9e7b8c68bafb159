//! Archive entry metadata shared by the policies and the extractor.

/// What an archive entry is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// Metadata for one entry, read without decompressing it.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Entry name as stored in the archive.
    pub name: String,
    /// Declared uncompressed size.
    pub size: u64,
    pub kind: EntryKind,
    pub encrypted: bool,
    /// Unix permission bits, when the archive recorded them.
    pub mode: Option<u32>,
}

impl EntryInfo {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}
