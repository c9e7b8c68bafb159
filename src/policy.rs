//! Checks applied to every bundle entry before it touches the disk.
//!
//! Story bundles come from a remote service, so they are handled like any
//! other untrusted archive: each entry has to pass the whole [`PolicyChain`]
//! before the extractor writes a byte.

use std::path::{Component, Path};

use path_jail::Jail;

use crate::entry::{EntryInfo, EntryKind};
use crate::error::Error;
use crate::limits::Limits;

/// Running totals used by the cumulative checks.
#[derive(Debug, Clone, Default)]
pub struct ExtractionState {
    pub files_extracted: usize,
    pub dirs_created: usize,
    pub bytes_written: u64,
    /// Symlinks and other entries left out of the bundle.
    pub entries_skipped: usize,
}

/// A single check run against each entry.
pub trait Policy: Send + Sync {
    fn check(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<(), Error>;
}

/// Policies that must all pass, evaluated in insertion order.
#[derive(Default)]
pub struct PolicyChain {
    policies: Vec<Box<dyn Policy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: Policy + 'static>(mut self, policy: P) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    /// The chain used for story bundles: names, jail, symlinks, depth, counts and sizes.
    pub fn for_bundle(
        destination: &Path,
        limits: &Limits,
        symlinks: SymlinkBehavior,
    ) -> Result<Self, Error> {
        Ok(Self::new()
            .with(NamePolicy)
            .with(PathPolicy::new(destination)?)
            .with(EncryptionPolicy)
            .with(SymlinkPolicy::new(symlinks))
            .with(DepthPolicy::new(limits.max_path_depth))
            .with(CountPolicy::new(limits.max_file_count))
            .with(SizePolicy::new(limits.max_single_file, limits.max_total_bytes)))
    }

    pub fn check_all(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<(), Error> {
        self.policies
            .iter()
            .try_for_each(|policy| policy.check(entry, state))
    }
}

/// Rejects names that are unsafe on some filesystem we might serve from.
pub struct NamePolicy;

impl NamePolicy {
    fn validate(name: &str) -> Result<(), &'static str> {
        if name.is_empty() {
            return Err("empty filename");
        }
        if name.chars().any(char::is_control) {
            return Err("contains control characters");
        }
        if name.contains('\\') {
            return Err("contains backslash");
        }
        if name.len() > 1024 {
            return Err("path too long (>1024 bytes)");
        }
        if name.split('/').any(|segment| segment.len() > 255) {
            return Err("path component too long (>255 bytes)");
        }

        for component in Path::new(name).components() {
            let Component::Normal(segment) = component else {
                continue;
            };
            let Some(segment) = segment.to_str() else {
                continue;
            };
            let upper = segment.to_ascii_uppercase();
            let stem = upper.split('.').next().unwrap_or_default();
            if is_reserved_windows_name(stem) {
                return Err("Windows reserved name");
            }
        }

        Ok(())
    }
}

fn is_reserved_windows_name(stem: &str) -> bool {
    if matches!(stem, "CON" | "PRN" | "AUX" | "NUL") {
        return true;
    }
    let Some(suffix) = stem
        .strip_prefix("COM")
        .or_else(|| stem.strip_prefix("LPT"))
    else {
        return false;
    };
    matches!(suffix.as_bytes(), [b'1'..=b'9'])
}

impl Policy for NamePolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<(), Error> {
        Self::validate(&entry.name).map_err(|reason| Error::InvalidFilename {
            entry: entry.name.clone(),
            reason: reason.to_string(),
        })
    }
}

/// Keeps every entry inside the destination directory (Zip Slip).
pub struct PathPolicy {
    jail: Jail,
}

impl PathPolicy {
    pub fn new(destination: &Path) -> Result<Self, Error> {
        Ok(Self {
            jail: Jail::new(destination)?,
        })
    }
}

impl Policy for PathPolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<(), Error> {
        self.jail
            .join(&entry.name)
            .map(|_| ())
            .map_err(|e| Error::PathEscape {
                entry: entry.name.clone(),
                detail: e.to_string(),
            })
    }
}

pub struct EncryptionPolicy;

impl Policy for EncryptionPolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<(), Error> {
        if entry.encrypted {
            return Err(Error::EncryptedEntry {
                entry: entry.name.clone(),
            });
        }
        Ok(())
    }
}

/// What to do when a bundle contains a symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymlinkBehavior {
    /// Leave the link out of the extracted story.
    #[default]
    Skip,
    /// Refuse the whole bundle.
    Error,
}

pub struct SymlinkPolicy {
    pub behavior: SymlinkBehavior,
}

impl SymlinkPolicy {
    pub fn new(behavior: SymlinkBehavior) -> Self {
        Self { behavior }
    }
}

impl Policy for SymlinkPolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<(), Error> {
        // Skipping is the extractor's job; only the refusing mode fails here.
        if entry.kind == EntryKind::Symlink && self.behavior == SymlinkBehavior::Error {
            return Err(Error::SymlinkNotAllowed {
                entry: entry.name.clone(),
            });
        }
        Ok(())
    }
}

pub struct DepthPolicy {
    pub max_depth: usize,
}

impl DepthPolicy {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl Policy for DepthPolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<(), Error> {
        let depth = Path::new(&entry.name)
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count();
        if depth > self.max_depth {
            return Err(Error::PathTooDeep {
                entry: entry.name.clone(),
                depth,
                limit: self.max_depth,
            });
        }
        Ok(())
    }
}

/// Caps the number of regular files.
pub struct CountPolicy {
    pub max_files: usize,
}

impl CountPolicy {
    pub fn new(max_files: usize) -> Self {
        Self { max_files }
    }
}

impl Policy for CountPolicy {
    fn check(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<(), Error> {
        if entry.is_file() && state.files_extracted >= self.max_files {
            return Err(Error::FileCountExceeded {
                limit: self.max_files,
                attempted: state.files_extracted + 1,
            });
        }
        Ok(())
    }
}

/// Checks declared sizes. The extractor re-checks actual sizes while streaming.
pub struct SizePolicy {
    pub max_single_file: u64,
    pub max_total: u64,
}

impl SizePolicy {
    pub fn new(max_single_file: u64, max_total: u64) -> Self {
        Self {
            max_single_file,
            max_total,
        }
    }
}

impl Policy for SizePolicy {
    fn check(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<(), Error> {
        if !entry.is_file() {
            return Ok(());
        }
        if entry.size > self.max_single_file {
            return Err(Error::FileTooLarge {
                entry: entry.name.clone(),
                limit: self.max_single_file,
                size: entry.size,
            });
        }
        let would_be = state.bytes_written.saturating_add(entry.size);
        if would_be > self.max_total {
            return Err(Error::TotalSizeExceeded {
                limit: self.max_total,
                would_be,
            });
        }
        Ok(())
    }
}
