use std::fmt;

/// Everything that can go wrong while talking to Shorthand or unpacking a
/// story bundle.
///
/// New variants may appear in minor releases, so matches need a `_` arm.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Settings file missing or malformed.
    Config { path: String, detail: String },

    /// Node or story id that cannot be a single path segment.
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    /// No response at all: DNS, connect, TLS or timeout.
    Transport { url: String, detail: String },

    /// Bundle entry resolves outside the story directory.
    PathEscape { entry: String, detail: String },

    /// Bundle contains a symlink and symlinks are refused.
    SymlinkNotAllowed { entry: String },

    TotalSizeExceeded { limit: u64, would_be: u64 },

    FileCountExceeded { limit: usize, attempted: usize },

    FileTooLarge { entry: String, limit: u64, size: u64 },

    /// Entry inflated past the size its header declared.
    SizeMismatch {
        entry: String,
        declared: u64,
        actual: u64,
    },

    PathTooDeep {
        entry: String,
        depth: usize,
        limit: usize,
    },

    /// Name that some filesystem would misinterpret.
    InvalidFilename { entry: String, reason: String },

    /// Password-protected entries cannot be served.
    EncryptedEntry { entry: String },

    Zip(zip::result::ZipError),

    Io(std::io::Error),

    Jail(path_jail::JailError),

    /// The HTTP client itself could not be set up.
    Http(reqwest::Error),
}

/// Human-readable byte count, e.g. "1.5 MB".
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { path, detail } => {
                write!(f, "invalid configuration '{}': {}", path, detail)
            }
            Self::InvalidIdentifier {
                kind,
                value,
                reason,
            } => write!(f, "invalid {} id '{}': {}", kind, value, reason),
            Self::Transport { url, detail } => write!(f, "request to {} failed: {}", url, detail),
            Self::PathEscape { entry, detail } => {
                write!(f, "bundle entry '{}' leaves the story directory: {}", entry, detail)
            }
            Self::SymlinkNotAllowed { entry } => {
                write!(f, "bundle entry '{}' is a symlink", entry)
            }
            Self::TotalSizeExceeded { limit, would_be } => write!(
                f,
                "bundle would unpack to {}, over the {} allowance",
                format_bytes(*would_be),
                format_bytes(*limit)
            ),
            Self::FileCountExceeded { limit, attempted } => write!(
                f,
                "bundle holds more than {} files (reached file {})",
                limit, attempted
            ),
            Self::FileTooLarge { entry, limit, size } => write!(
                f,
                "bundle entry '{}' is {}, over the {} per-file allowance",
                entry,
                format_bytes(*size),
                format_bytes(*limit)
            ),
            Self::SizeMismatch {
                entry,
                declared,
                actual,
            } => write!(
                f,
                "bundle entry '{}' declares {} but inflates to at least {}",
                entry,
                format_bytes(*declared),
                format_bytes(*actual)
            ),
            Self::PathTooDeep {
                entry,
                depth,
                limit,
            } => write!(
                f,
                "bundle entry '{}' is nested {} levels deep (allowed: {})",
                entry, depth, limit
            ),
            Self::InvalidFilename { entry, reason } => {
                write!(f, "bundle entry '{}' has an unusable name: {}", entry, reason)
            }
            Self::EncryptedEntry { entry } => {
                write!(f, "bundle entry '{}' is encrypted", entry)
            }
            Self::Zip(e) => write!(f, "zip format error: {}", e),
            Self::Io(e) => write!(f, "filesystem error: {}", e),
            Self::Jail(e) => write!(f, "could not confine story directory: {}", e),
            Self::Http(e) => write!(f, "could not build HTTP client: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Zip(inner) => Some(inner),
            Self::Io(inner) => Some(inner),
            Self::Jail(inner) => Some(inner),
            Self::Http(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(inner: zip::result::ZipError) -> Self {
        Self::Zip(inner)
    }
}

impl From<std::io::Error> for Error {
    fn from(inner: std::io::Error) -> Self {
        Self::Io(inner)
    }
}

impl From<path_jail::JailError> for Error {
    fn from(inner: path_jail::JailError) -> Self {
        Self::Jail(inner)
    }
}

impl From<reqwest::Error> for Error {
    fn from(inner: reqwest::Error) -> Self {
        Self::Http(inner)
    }
}
