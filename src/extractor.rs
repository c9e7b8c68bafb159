use std::fs;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Component, Path, PathBuf};

use crate::entry::{EntryInfo, EntryKind};
use crate::error::Error;
use crate::limits::Limits;
use crate::policy::{ExtractionState, PolicyChain, SymlinkBehavior};

/// Counts gathered while unpacking a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub files_extracted: usize,
    pub dirs_created: usize,
    pub bytes_written: u64,
    pub entries_skipped: usize,
}

impl From<ExtractionState> for Report {
    fn from(state: ExtractionState) -> Self {
        Self {
            files_extracted: state.files_extracted,
            dirs_created: state.dirs_created,
            bytes_written: state.bytes_written,
            entries_skipped: state.entries_skipped,
        }
    }
}

/// Unpacks a story bundle into its destination directory.
///
/// Entries are written into a hidden staging directory next to the
/// destination. Only once every entry has been written is the previous
/// copy removed and the staging directory renamed into place, so a corrupt
/// or hostile bundle never leaves a half-written story behind.
///
/// ```no_run
/// use shorthand_sync::{Extractor, Limits};
///
/// let report = Extractor::new("/var/www/files/shorthand/42/abc")
///     .limits(Limits { max_file_count: 5_000, ..Limits::default() })
///     .extract_file("/tmp/sh_zip1234")?;
/// println!("{} files", report.files_extracted);
/// # Ok::<(), shorthand_sync::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Extractor {
    destination: PathBuf,
    limits: Limits,
    symlinks: SymlinkBehavior,
}

impl Extractor {
    /// The destination and its parents are created on demand.
    pub fn new<P: AsRef<Path>>(destination: P) -> Self {
        Self {
            destination: destination.as_ref().to_path_buf(),
            limits: Limits::default(),
            symlinks: SymlinkBehavior::default(),
        }
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn symlinks(mut self, behavior: SymlinkBehavior) -> Self {
        self.symlinks = behavior;
        self
    }

    /// Extract from a file path. Convenience wrapper around [`Self::extract`].
    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<Report, Error> {
        let file = fs::File::open(path)?;
        self.extract(BufReader::new(file))
    }

    pub fn extract<R: Read + Seek>(&self, reader: R) -> Result<Report, Error> {
        let mut archive = zip::ZipArchive::new(reader)?;

        let parent = self
            .destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)?;
        let policies = PolicyChain::for_bundle(staging.path(), &self.limits, self.symlinks)?;

        let mut state = ExtractionState::default();
        for index in 0..archive.len() {
            unpack_entry(&mut archive, index, staging.path(), &policies, &mut state)?;
        }

        // Temporary directories are created 0700; the web server has to read this one.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(staging.path(), fs::Permissions::from_mode(0o755))?;
        }

        replace_dir(staging.path(), &self.destination, parent)?;
        tracing::debug!(
            destination = %self.destination.display(),
            files = state.files_extracted,
            bytes = state.bytes_written,
            "bundle extracted"
        );
        // `staging` now points at a moved directory; dropping it is a no-op.
        Ok(state.into())
    }
}

/// Read an entry's metadata without decompressing it.
fn entry_info<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    index: usize,
) -> Result<EntryInfo, Error> {
    let raw = archive.by_index_raw(index)?;
    let kind = if raw.is_symlink() {
        EntryKind::Symlink
    } else if raw.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    Ok(EntryInfo {
        name: raw.name().to_string(),
        size: raw.size(),
        kind,
        encrypted: raw.encrypted(),
        mode: raw.unix_mode(),
    })
}

fn unpack_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    index: usize,
    root: &Path,
    policies: &PolicyChain,
    state: &mut ExtractionState,
) -> Result<(), Error> {
    let info = entry_info(archive, index)?;
    policies.check_all(&info, state)?;

    let target = staged_path(root, &info.name);

    match info.kind {
        EntryKind::Symlink => {
            state.entries_skipped += 1;
        }
        EntryKind::Directory => {
            fs::create_dir_all(&target)?;
            state.dirs_created += 1;
        }
        EntryKind::File => {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&target)?;
            let mut entry = archive.by_index(index)?;

            let written = io::copy(&mut (&mut entry).take(info.size), &mut out)?;
            let mut probe = [0u8; 1];
            if entry.read(&mut probe)? > 0 {
                return Err(Error::SizeMismatch {
                    entry: info.name,
                    declared: info.size,
                    actual: written + 1,
                });
            }

            #[cfg(unix)]
            if let Some(mode) = info.mode {
                use std::os::unix::fs::PermissionsExt;
                // No setuid, setgid or sticky bits; always world-readable.
                let mode = (mode & 0o777) | 0o444;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
            }

            state.bytes_written += written;
            state.files_extracted += 1;
        }
    }
    Ok(())
}

/// Join only the normal components, so a root or prefix in the name cannot
/// replace `root`. The jail has already refused `..`.
fn staged_path(root: &Path, name: &str) -> PathBuf {
    Path::new(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Swap `staged` into `destination`.
///
/// The previous copy is moved into a `.previous-*` directory under `parent`
/// first and only deleted once the new copy is in place. If the swap fails
/// the previous copy is moved back.
fn replace_dir(staged: &Path, destination: &Path, parent: &Path) -> Result<(), Error> {
    let previous = match fs::symlink_metadata(destination) {
        Ok(_) => {
            let aside = tempfile::Builder::new()
                .prefix(".previous-")
                .tempdir_in(parent)?;
            let held = aside.path().join("copy");
            fs::rename(destination, &held)?;
            Some((aside, held))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = fs::rename(staged, destination) {
        if let Some((aside, held)) = previous {
            if let Err(restore) = fs::rename(&held, destination) {
                tracing::error!(
                    destination = %destination.display(),
                    kept = %held.display(),
                    error = %restore,
                    "could not restore previous story copy"
                );
                // Keep the old copy on disk instead of deleting it with `aside`.
                let _ = aside.into_path();
            }
        }
        return Err(e.into());
    }
    // Dropping `previous` deletes the old copy.
    Ok(())
}

/// List the entries of a bundle without extracting anything.
pub fn list_entries<P: AsRef<Path>>(path: P) -> Result<Vec<EntryInfo>, Error> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
    (0..archive.len())
        .map(|index| entry_info(&mut archive, index))
        .collect()
}
