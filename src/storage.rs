//! Where extracted stories live on disk and on the web.

use std::path::{Path, PathBuf};

use crate::error::Error;

/// Directory under the public files root that holds every extracted story.
const STORY_DIR: &str = "shorthand";

/// The host's public file storage: a local directory and the URL serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicFiles {
    root: PathBuf,
    base_url: String,
}

/// Local path and public URL of one extracted story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryLocation {
    pub path: PathBuf,
    pub url: String,
}

impl PublicFiles {
    pub fn new<P: AsRef<Path>>(root: P, base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{root}/shorthand/{node_id}/{story_id}` and the matching URL.
    pub fn story_destination(&self, node_id: &str, story_id: &str) -> Result<StoryLocation, Error> {
        validate_segment("node", node_id)?;
        validate_segment("story", story_id)?;

        Ok(StoryLocation {
            path: self.root.join(STORY_DIR).join(node_id).join(story_id),
            url: format!("{}/{}/{}/{}", self.base_url, STORY_DIR, node_id, story_id),
        })
    }
}

/// Identifiers end up both in a filesystem path and in a URL path, unescaped.
pub(crate) fn validate_segment(kind: &'static str, value: &str) -> Result<(), Error> {
    let reason = if value.is_empty() {
        Some("empty")
    } else if value == "." || value == ".." {
        Some("relative path segment")
    } else if value.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if value.chars().any(char::is_control) {
        Some("contains control characters")
    } else if value.chars().any(char::is_whitespace) {
        Some("contains whitespace")
    } else if value.contains(['#', '?', '%']) {
        Some("contains a URL delimiter")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
