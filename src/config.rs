//! Credentials and settings for the Shorthand integration.
//!
//! The host system owns its configuration store; this crate only reads from it
//! through [`ConfigSource`]. [`Settings`] is a TOML-backed source for hosts
//! (and the CLI) that have nothing better.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::storage::PublicFiles;

pub const SERVER_URL_VAR: &str = "shorthand_server_url";
pub const TOKEN_VAR: &str = "shorthand_token";
pub const USER_ID_VAR: &str = "shorthand_user_id";

pub const DEFAULT_SERVER_URL: &str = "https://app.shorthand.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("shorthand_sync/", env!("CARGO_PKG_VERSION"));

/// Read-only, get-by-name access to the host's configuration variables.
pub trait ConfigSource: Send + Sync {
    fn variable(&self, name: &str) -> Option<String>;

    fn variable_or(&self, name: &str, default: &str) -> String {
        self.variable(name).unwrap_or_else(|| default.to_string())
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn variable(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn variable(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Account credentials as issued by Shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL without trailing slash.
    pub server_url: String,
    pub user_id: String,
    pub token: String,
}

impl Credentials {
    pub fn new(server_url: &str, user_id: &str, token: &str) -> Self {
        Self {
            server_url: normalize_server_url(server_url),
            user_id: user_id.trim().to_string(),
            token: token.trim().to_string(),
        }
    }

    pub fn load(source: &dyn ConfigSource) -> Self {
        Self::new(
            &source.variable_or(SERVER_URL_VAR, DEFAULT_SERVER_URL),
            &source.variable_or(USER_ID_VAR, ""),
            &source.variable_or(TOKEN_VAR, ""),
        )
    }

    /// Whether both the account id and the token are set.
    pub fn is_complete(&self) -> bool {
        !self.user_id.is_empty() && !self.token.is_empty()
    }

    /// Absolute URL of an API path such as `api/index/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, path.trim_start_matches('/'))
    }
}

fn normalize_server_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_SERVER_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Transport options for the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    /// Skip TLS certificate and hostname checks. Never enable in production.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// TOML settings file.
///
/// ```toml
/// [shorthand]
/// server_url = "https://app.shorthand.com"
/// user_id = "1234"
/// token = "secret"
///
/// [files]
/// public_path = "/var/www/site/files"
/// public_url = "https://example.org/files/"
///
/// [http]
/// timeout_secs = 60
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub shorthand: AccountSection,
    pub files: FilesSection,
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountSection {
    pub server_url: String,
    pub user_id: String,
    pub token: String,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            user_id: String::new(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    pub public_path: PathBuf,
    pub public_url: String,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            public_path: PathBuf::from("files"),
            public_url: "/files/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    pub user_agent: Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            accept_invalid_certs: false,
            user_agent: None,
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Self::parse(text, "<inline>")
    }

    fn parse(text: &str, origin: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config {
            path: origin.to_string(),
            detail: e.message().to_string(),
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::load(self)
    }

    pub fn public_files(&self) -> PublicFiles {
        PublicFiles::new(&self.files.public_path, &self.files.public_url)
    }

    pub fn http_options(&self) -> HttpOptions {
        let defaults = HttpOptions::default();
        HttpOptions {
            timeout: Duration::from_secs(self.http.timeout_secs.max(1)),
            accept_invalid_certs: self.http.accept_invalid_certs,
            user_agent: self.http.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

impl ConfigSource for Settings {
    fn variable(&self, name: &str) -> Option<String> {
        let value = match name {
            SERVER_URL_VAR => &self.shorthand.server_url,
            USER_ID_VAR => &self.shorthand.user_id,
            TOKEN_VAR => &self.shorthand.token,
            _ => return None,
        };
        Some(value.clone())
    }
}
