//! Blocking client for the Shorthand API.
//!
//! Every call is a single form-encoded POST carrying the account id and token.
//! Credentials are read from the injected [`ConfigSource`] on each call.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::blocking::{Client, Response};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::config::{ConfigSource, Credentials, HttpOptions, Settings};
use crate::error::Error;
use crate::extractor::Extractor;
use crate::limits::Limits;
use crate::notify::{LogNotifier, Notifier};
use crate::storage::PublicFiles;
use crate::story::{stories_from_index, CopyError, Profile, Story, StoryArchive};

/// Sent to the [`Notifier`] when the story index cannot be fetched.
pub const CONNECT_FAILED: &str =
    "Could not connect to Shorthand, please check your Shorthand module settings.";

const PROFILE_PATH: &str = "api/profile/";
const INDEX_PATH: &str = "api/index/";

/// Talks to one Shorthand account and publishes its stories into [`PublicFiles`].
///
/// ```no_run
/// use shorthand_sync::{Limits, Settings, ShorthandClient};
///
/// let settings = Settings::load("site.toml")?;
/// let client = ShorthandClient::from_settings(settings)?
///     .limits(Limits { max_total_bytes: 512 * 1024 * 1024, ..Limits::default() });
/// println!("{} stories", client.stories().len());
/// # Ok::<(), shorthand_sync::Error>(())
/// ```
pub struct ShorthandClient {
    http: Client,
    config: Arc<dyn ConfigSource>,
    files: PublicFiles,
    limits: Limits,
    notifier: Arc<dyn Notifier>,
    spool_dir: Option<PathBuf>,
}

impl ShorthandClient {
    /// Client with default transport options: 30s timeout, TLS verification on.
    pub fn new<C: ConfigSource + 'static>(config: C, files: PublicFiles) -> Result<Self, Error> {
        Self::with_options(config, files, &HttpOptions::default())
    }

    /// Client with explicit transport options.
    ///
    /// Fails only when the TLS backend cannot be initialised.
    pub fn with_options<C: ConfigSource + 'static>(
        config: C,
        files: PublicFiles,
        options: &HttpOptions,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: build_http(options)?,
            config: Arc::new(config),
            files,
            limits: Limits::default(),
            notifier: Arc::new(LogNotifier),
            spool_dir: None,
        })
    }

    /// Client reading credentials, storage and transport options from a settings file.
    pub fn from_settings(settings: Settings) -> Result<Self, Error> {
        let files = settings.public_files();
        let options = settings.http_options();
        Self::with_options(settings, files, &options)
    }

    /// Limits applied to every downloaded bundle.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Where user-visible errors go. Defaults to [`LogNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Directory for downloaded archives. Defaults to the system temp directory.
    pub fn spool_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    /// The credentials currently configured.
    pub fn credentials(&self) -> Credentials {
        Credentials::load(self.config.as_ref())
    }

    /// Storage mapping used by [`Self::copy_story`].
    pub fn public_files(&self) -> &PublicFiles {
        &self.files
    }

    /// Fetch the profile for an account id and token, typically before saving them.
    ///
    /// Returns an empty profile without contacting the server when either value
    /// is empty. Bodies that are not a JSON object also yield an empty profile;
    /// only a failed request is an error.
    pub fn profile(&self, user_id: &str, token: &str) -> Result<Profile, Error> {
        let server = self.credentials().server_url;
        let creds = Credentials::new(&server, user_id, token);
        if !creds.is_complete() {
            return Ok(Profile::default());
        }

        let url = creds.endpoint(PROFILE_PATH);
        tracing::debug!(%url, "fetching Shorthand profile");
        let body = self
            .post(&creds, &url)
            .and_then(Response::bytes)
            .map_err(|e| Error::Transport {
                url: url.clone(),
                detail: e.to_string(),
            })?;
        Ok(Profile::from_json(decode_lenient(&url, &body)))
    }

    pub fn profile_from_config(&self) -> Result<Profile, Error> {
        let creds = self.credentials();
        self.profile(&creds.user_id, &creds.token)
    }

    /// True when the configured credentials produce a non-empty profile.
    pub fn verify_credentials(&self) -> bool {
        match self.profile_from_config() {
            Ok(profile) => !profile.is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, "credential check failed");
                false
            }
        }
    }

    /// Stories belonging to the configured account.
    ///
    /// A request that produces no data posts [`CONNECT_FAILED`] to the
    /// notifier. Responses without a `stories` array read as an empty list.
    pub fn stories(&self) -> Vec<Story> {
        let creds = self.credentials();
        if !creds.is_complete() {
            return Vec::new();
        }

        let url = creds.endpoint(INDEX_PATH);
        tracing::debug!(%url, "listing Shorthand stories");
        let body = match self.post(&creds, &url).and_then(Response::bytes) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Shorthand index request failed");
                self.notifier.error(CONNECT_FAILED);
                return Vec::new();
            }
        };

        stories_from_index(decode_lenient(&url, &body))
    }

    /// Download a story bundle and unpack it under `shorthand/{node_id}/{story_id}`.
    ///
    /// `Ok(None)` means no credentials are configured and nothing was attempted.
    pub fn copy_story(
        &self,
        node_id: &str,
        story_id: &str,
    ) -> Result<Option<StoryArchive>, CopyError> {
        let creds = self.credentials();
        if !creds.is_complete() {
            tracing::debug!(node_id, story_id, "no Shorthand credentials, skipping copy");
            return Ok(None);
        }

        let location = self
            .files
            .story_destination(node_id, story_id)
            .map_err(CopyError::Invalid)?;
        let url = creds.endpoint(&format!("api/story/{}/", story_id));

        let spool = self.download(&creds, &url)?;
        let report = Extractor::new(&location.path)
            .limits(self.limits)
            .extract_file(spool.path())
            .map_err(|source| {
                tracing::warn!(story_id, error = %source, "story bundle rejected");
                CopyError::Extract {
                    path: location.path.clone(),
                    source,
                }
            })?;

        tracing::info!(
            node_id,
            story_id,
            path = %location.path.display(),
            files = report.files_extracted,
            "story copied"
        );
        Ok(Some(StoryArchive {
            path: location.path,
            url: location.url,
            report,
        }))
    }

    /// Stream the response body into a temporary `sh_zip*` file.
    fn download(&self, creds: &Credentials, url: &str) -> Result<NamedTempFile, CopyError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sh_zip");
        let spool = match &self.spool_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut spool = spool.map_err(|e| CopyError::download(e.to_string(), None))?;

        tracing::debug!(%url, spool = %spool.path().display(), "downloading story bundle");
        let mut response = self.post(creds, url).map_err(|e| {
            tracing::warn!(%url, error = %e, "story download failed");
            CopyError::download(e.to_string(), None)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "story download refused");
            return Err(CopyError::download(
                format!("server answered {}", status),
                Some(status.as_u16()),
            ));
        }

        response
            .copy_to(spool.as_file_mut())
            .map_err(|e| CopyError::download(e.to_string(), Some(status.as_u16())))?;
        Ok(spool)
    }

    fn post(&self, creds: &Credentials, url: &str) -> reqwest::Result<Response> {
        self.http
            .post(url)
            .form(&[("user", creds.user_id.as_str()), ("token", creds.token.as_str())])
            .send()
    }
}

fn build_http(options: &HttpOptions) -> Result<Client, Error> {
    if options.accept_invalid_certs {
        tracing::warn!("TLS certificate verification is disabled for Shorthand requests");
    }
    let client = Client::builder()
        .timeout(options.timeout)
        .user_agent(options.user_agent.as_str())
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        .build()?;
    Ok(client)
}

/// Decode a body as JSON, treating anything unparseable as `null`.
fn decode_lenient(url: &str, body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::warn!(%url, error = %e, "ignoring non-JSON response");
        Value::Null
    })
}
