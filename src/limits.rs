/// Resource limits applied while unpacking a story bundle.
///
/// Story bundles are HTML, scripts and media. The defaults leave room for
/// large video-heavy stories while still stopping decompression bombs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum bytes written across all entries.
    pub max_total_bytes: u64,
    /// Maximum number of files.
    pub max_file_count: usize,
    /// Maximum size of any single file.
    pub max_single_file: u64,
    /// Maximum number of path components per entry.
    pub max_path_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_total_bytes: 2 * 1024 * 1024 * 1024,
            max_file_count: 20_000,
            max_single_file: 1024 * 1024 * 1024,
            max_path_depth: 32,
        }
    }
}
