//! Values returned by the Shorthand operations.
//!
//! Shorthand's response schema is not ours to define, so profiles and story
//! summaries stay loosely typed maps with a few convenience accessors.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::extractor::Report;

/// A Shorthand user profile, passed through as decoded JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(pub Map<String, Value>);

impl Profile {
    /// Anything other than a JSON object decodes to an empty profile.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username").and_then(Value::as_str)
    }
}

/// One entry of the account's story index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Story(pub Map<String, Value>);

impl Story {
    /// Story ids show up as strings or numbers depending on the account.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Pull the `stories` array out of an index response. Non-object items are dropped.
pub(crate) fn stories_from_index(body: Value) -> Vec<Story> {
    let Value::Object(mut map) = body else {
        return Vec::new();
    };
    match map.remove("stories") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(Story(fields)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// A story bundle unpacked into public storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryArchive {
    pub path: PathBuf,
    pub url: String,
    pub report: Report,
}

/// Where a story copy gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStage {
    Validate,
    Download,
    Extract,
}

impl fmt::Display for CopyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validate",
            Self::Download => "download",
            Self::Extract => "extract",
        })
    }
}

pub const DOWNLOAD_FAILED: &str = "Could not download the story archive from Shorthand";

/// Failure of [`crate::ShorthandClient::copy_story`], tagged with its stage.
#[derive(Debug)]
#[non_exhaustive]
pub enum CopyError {
    /// Node or story id rejected before any request was made.
    Invalid(Error),

    /// The archive never arrived.
    Download {
        /// Message suitable for showing to an editor.
        pretty: String,
        /// Low-level transport or status description.
        error: String,
        /// HTTP status, when the server answered at all.
        response: Option<u16>,
    },

    /// The archive arrived but could not be unpacked.
    Extract { path: PathBuf, source: Error },
}

impl CopyError {
    pub fn stage(&self) -> CopyStage {
        match self {
            Self::Invalid(_) => CopyStage::Validate,
            Self::Download { .. } => CopyStage::Download,
            Self::Extract { .. } => CopyStage::Extract,
        }
    }

    pub(crate) fn download(error: String, response: Option<u16>) -> Self {
        Self::Download {
            pretty: DOWNLOAD_FAILED.to_string(),
            error,
            response,
        }
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "{}", e),
            Self::Download {
                pretty,
                error,
                response: Some(status),
            } => write!(f, "{}: {} (HTTP {})", pretty, error, status),
            Self::Download { pretty, error, .. } => write!(f, "{}: {}", pretty, error),
            Self::Extract { path, source } => {
                write!(f, "could not extract story into {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invalid(e) | Self::Extract { source: e, .. } => Some(e),
            Self::Download { .. } => None,
        }
    }
}
