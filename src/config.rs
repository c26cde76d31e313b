//! Configuration file handling for the insights dashboard.
//!
//! The configuration file is stored at `$INSIGHTS_HOME/config.json` and holds the shared access
//! code, the address the server binds to and the upload size limit.

use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "insights";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";
/// 25 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$INSIGHTS_HOME` and from there it loads `$INSIGHTS_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory and an initial `config.json` file.
    ///
    /// # Arguments
    /// - `dir` - The directory that will hold the configuration, e.g. `$HOME/insights`
    /// - `auth_code` - The access code operators enter on the login page
    /// - `bind` - The address to serve on, defaults to `127.0.0.1:8501`
    ///
    /// # Errors
    /// - The code is empty or the bind address does not parse.
    /// - A config file already exists in `dir`.
    /// - Any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        auth_code: &str,
        bind: Option<&str>,
    ) -> Result<Self> {
        let config_file = ConfigFile {
            auth_code: auth_code.to_string(),
            bind: bind.unwrap_or(DEFAULT_BIND).to_string(),
            ..ConfigFile::default()
        };
        config_file.validate()?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the insights home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A config file already exists at '{}'",
                config_path.display()
            )
        }
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `insights_home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(insights_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = insights_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The insights home directory is missing, run 'insights init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!(
                "The config file is missing '{}', run 'insights init' first",
                config_path.display()
            )
        }
        let config_file = ConfigFile::load(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
        })
    }

    /// An in-memory configuration with default settings, not backed by a file.
    pub fn new(auth_code: impl Into<String>) -> Self {
        Self {
            root: PathBuf::new(),
            config_path: PathBuf::new(),
            config_file: ConfigFile {
                auth_code: auth_code.into(),
                ..ConfigFile::default()
            },
        }
    }

    /// Replaces settings with values given on the command line.
    pub fn with_overrides(mut self, bind: Option<&str>, auth_code: Option<&str>) -> Result<Self> {
        if let Some(bind) = bind {
            self.config_file.bind = bind.to_string();
        }
        if let Some(auth_code) = auth_code {
            self.config_file.auth_code = auth_code.to_string();
        }
        self.config_file.validate()?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn auth_code(&self) -> &str {
        &self.config_file.auth_code
    }

    /// The address the dashboard server listens on.
    pub fn bind(&self) -> Result<SocketAddr> {
        self.config_file.bind_addr()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config_file.max_upload_bytes
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "insights",
///   "config_version": 1,
///   "auth_code": "2580",
///   "bind": "127.0.0.1:8501",
///   "max_upload_bytes": 26214400
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "insights"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The shared access code for the login page
    auth_code: String,

    /// Socket address for the HTTP server
    #[serde(default = "default_bind")]
    bind: String,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    max_upload_bytes: usize,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            auth_code: String::new(),
            bind: default_bind(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if its values are invalid
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        config.validate()?;

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.auth_code.is_empty(),
            "The auth_code must not be empty"
        );
        let _ = self.bind_addr()?;
        Ok(())
    }

    fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.bind))
    }
}
