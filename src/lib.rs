//! Pull stories from Shorthand into a CMS's public file storage.
//!
//! ```no_run
//! use shorthand_sync::{PublicFiles, ShorthandClient};
//! use std::collections::BTreeMap;
//!
//! let mut config = BTreeMap::new();
//! config.insert("shorthand_user_id".to_string(), "1234".to_string());
//! config.insert("shorthand_token".to_string(), "secret".to_string());
//!
//! let files = PublicFiles::new("/var/www/site/files", "https://example.org/files/");
//! let client = ShorthandClient::new(config, files)?;
//!
//! for story in client.stories() {
//!     println!("{:?} {:?}", story.id(), story.title());
//! }
//!
//! match client.copy_story("42", "abc") {
//!     Ok(Some(copy)) => println!("embedded at {}", copy.url),
//!     Ok(None) => println!("Shorthand is not configured"),
//!     Err(e) => eprintln!("{} failed: {}", e.stage(), e),
//! }
//! # Ok::<(), shorthand_sync::Error>(())
//! ```

mod client;
pub mod config;
mod entry;
mod error;
mod extractor;
mod limits;
mod notify;
pub mod policy;
mod storage;
mod story;

pub use client::{ShorthandClient, CONNECT_FAILED};
pub use config::{ConfigSource, Credentials, HttpOptions, Settings};
pub use entry::{EntryInfo, EntryKind};
pub use error::Error;
pub use extractor::{list_entries, Extractor, Report};
pub use limits::Limits;
pub use notify::{LogNotifier, Notifier};
pub use policy::SymlinkBehavior;
pub use storage::{PublicFiles, StoryLocation};
pub use story::{CopyError, CopyStage, Profile, Story, StoryArchive, DOWNLOAD_FAILED};

/// Unpack a story bundle into `destination` with default limits.
pub fn extract_file<P: AsRef<std::path::Path>, F: AsRef<std::path::Path>>(
    destination: P,
    file_path: F,
) -> Result<Report, Error> {
    Extractor::new(destination).extract_file(file_path)
}
