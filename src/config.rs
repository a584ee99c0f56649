//! Configuration file handling.
//!
//! The configuration file is stored at `$NINJA_HOME/config.json` and contains the address of the
//! expense backend along with request and processing-poll settings.

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "expense-ninja";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
pub(crate) const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_MAX_POLLS: u32 = 30;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$NINJA_HOME` and from there it loads `$NINJA_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    api_base_url: Url,
}

impl Config {
    /// Creates the home directory and an initial `config.json` pointing at `api_base_url`.
    ///
    /// # Errors
    /// - Returns an error if `api_base_url` is not a valid URL.
    /// - Returns an error if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>, api_base_url: &str) -> Result<Self> {
        Self::create_inner(dir.into(), api_base_url)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(maybe_relative: PathBuf, api_base_url: &str) -> Res<Self> {
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the ninja home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;
        let config_path = root.join(CONFIG_JSON);

        let config_file = ConfigFile {
            api_base_url: api_base_url.to_string(),
            ..ConfigFile::default()
        };
        let api_base_url = parse_base_url(&config_file.api_base_url)?;
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
            api_base_url,
        })
    }

    /// This will
    /// - validate that `ninja_home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(ninja_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(ninja_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Ninja home is missing, run 'ninja init' first")?;
        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let api_base_url = parse_base_url(&config_file.api_base_url)?;
        Ok(Self {
            root,
            config_path,
            config_file,
            api_base_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    /// The timeout applied to every gateway request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.request_timeout_secs)
    }

    /// How long to wait between processing-status polls.
    pub fn processing_poll_interval(&self) -> Duration {
        Duration::from_millis(self.config_file.processing_poll_interval_ms)
    }

    /// How many times the CLI polls for processing completion before giving up.
    pub fn processing_max_polls(&self) -> u32 {
        self.config_file.processing_max_polls
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expense-ninja",
///   "config_version": 1,
///   "api_base_url": "http://127.0.0.1:5000",
///   "request_timeout_secs": 30,
///   "processing_poll_interval_ms": 2000,
///   "processing_max_polls": 30
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expense-ninja"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the expense backend
    api_base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    processing_poll_interval_ms: u64,

    #[serde(default = "default_max_polls")]
    processing_max_polls: u32,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            processing_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            processing_max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_polls() -> u32 {
    DEFAULT_MAX_POLLS
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if `app_name` is wrong.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.request_timeout_secs > 0,
            "request_timeout_secs must be greater than zero"
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

/// Parses the backend base URL. A trailing slash is added when missing so that `Url::join` keeps
/// any path prefix, e.g. `https://example.com/api` + `edit` -> `https://example.com/api/edit`.
fn parse_base_url(s: &str) -> Res<Url> {
    let with_slash = if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    };
    let url = Url::parse(&with_slash).with_context(|| format!("Invalid api_base_url '{s}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api_base_url must be http or https, got '{}'", url.scheme());
    }
    Ok(url)
}
