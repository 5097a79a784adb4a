//! Application configuration.
//!
//! Behavior settings are loaded from a TOML file at:
//! 1. `$INBOX_HARVEST_CONFIG` (environment variable)
//! 2. `~/.config/inbox-harvest/config.toml` (Linux/macOS)
//!    `%APPDATA%\inbox-harvest\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Mailbox credentials never come from the file; they are read from the
//! environment (see [`Credentials::from_env`]).

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HarvestError, Result};

/// Environment variable holding the mailbox login.
pub const ENV_LOGIN: &str = "EMAIL_LOGIN";
/// Environment variable holding the mailbox password (an app password for most providers).
pub const ENV_PASSWORD: &str = "EMAIL_PASSWORD";
/// Environment variable holding the IMAP host name.
pub const ENV_IMAP_HOST: &str = "EMAIL_IMAP_HOST";
/// Environment variable holding the IMAP port (usually 993).
pub const ENV_IMAP_PORT: &str = "EMAIL_IMAP_PORT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Which mailbox to read.
    pub mailbox: MailboxConfig,
    /// Search window and output location.
    pub harvest: HarvestConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mailbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Folder to select.
    pub name: String,
}

/// Harvest defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// How many days back to search.
    pub days: u32,
    /// Directory attachments are written to.
    pub output_dir: PathBuf,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            name: "INBOX".to_string(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            days: 2,
            output_dir: PathBuf::from("attachments"),
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("INBOX_HARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("inbox-harvest").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inbox-harvest")
}

// ── Credentials ─────────────────────────────────────────────────

/// What is needed to open a mailbox session.
///
/// The secret is wrapped so it cannot end up in `Debug` output or logs.
#[derive(Debug)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: SecretString,
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Read `EMAIL_LOGIN`, `EMAIL_PASSWORD`, `EMAIL_IMAP_HOST` and
    /// `EMAIL_IMAP_PORT` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from any key/value source.
    ///
    /// Every missing or empty variable is named in the error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let login = read(ENV_LOGIN);
        let password = read(ENV_PASSWORD);
        let host = read(ENV_IMAP_HOST);
        let port = read(ENV_IMAP_PORT);

        let missing: Vec<&str> = [
            (ENV_LOGIN, login.is_none()),
            (ENV_PASSWORD, password.is_none()),
            (ENV_IMAP_HOST, host.is_none()),
            (ENV_IMAP_PORT, port.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(login), Some(password), Some(host), Some(port)) = (login, password, host, port)
        else {
            return Err(HarvestError::Configuration(format!(
                "missing environment variables: {}",
                missing.join(", ")
            )));
        };

        let port: u16 = port.trim().parse().map_err(|_| {
            HarvestError::Configuration(format!("{ENV_IMAP_PORT} is not a valid port: '{port}'"))
        })?;

        let credentials = Self::new(host.trim(), port, login.trim(), password);
        credentials.validate()?;
        Ok(credentials)
    }

    /// Check that every field is present; called before any connection attempt.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(HarvestError::Configuration("IMAP host is empty".into()));
        }
        if self.port == 0 {
            return Err(HarvestError::Configuration("IMAP port is 0".into()));
        }
        if self.username.trim().is_empty() {
            return Err(HarvestError::Configuration("mailbox login is empty".into()));
        }
        if self.secret.expose_secret().is_empty() {
            return Err(HarvestError::Configuration("mailbox password is empty".into()));
        }
        Ok(())
    }
}
