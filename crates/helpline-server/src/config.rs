//! Startup configuration.
//!
//! Two TOML files are read once at startup: the server config and the staff
//! credential store. Either one missing or malformed is fatal; the server
//! must not serve requests without them.
//!
//! ```toml
//! listen_address = "0.0.0.0:8080"
//! auth_secret = "change me"
//! max_times_helped = 5
//! store_path = "persistence.json"
//! credentials_path = "credentials.toml"
//! estimate_window_minutes = 30
//!
//! [access]
//! allowed_ranges = ["137.82.0.0/16"]
//! trusted_suffix = ".ubc.ca."
//! ```

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use chrono::TimeDelta;
use helpline_core::{DEFAULT_MAX_TIMES_HELPED, QueuePolicy};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Errors loading configuration or credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// File is not valid TOML for the expected shape.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying parse error
        source: toml::de::Error,
    },

    /// Values parsed but are unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub listen_address: String,
    /// Seed for self-service secret derivation
    pub auth_secret: String,
    /// Daily help cap per student
    #[serde(default = "default_max_times_helped")]
    pub max_times_helped: NonZeroUsize,
    /// Queue document location
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Staff credential file location
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Wait estimate window in minutes, 0 for all history
    #[serde(default = "default_estimate_window_minutes")]
    pub estimate_window_minutes: u32,
    /// Network filter for student-facing routes; absent disables filtering
    #[serde(default)]
    pub access: Option<AccessConfig>,
}

/// Network access filter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// CIDR ranges that are always allowed
    #[serde(default)]
    pub allowed_ranges: Vec<String>,
    /// Reverse-DNS suffix accepted for addresses outside the ranges
    #[serde(default)]
    pub trusted_suffix: Option<String>,
}

fn default_max_times_helped() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_MAX_TIMES_HELPED).unwrap_or(NonZeroUsize::MIN)
}

fn default_store_path() -> PathBuf {
    PathBuf::from("persistence.json")
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.toml")
}

const fn default_estimate_window_minutes() -> u32 {
    30
}

impl Config {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_address.trim().is_empty() {
            return Err(ConfigError::Invalid("listen_address is empty".to_string()));
        }
        if self.auth_secret.is_empty() {
            return Err(ConfigError::Invalid("auth_secret is empty".to_string()));
        }
        Ok(())
    }

    /// Queue policy derived from this config.
    pub fn policy(&self) -> QueuePolicy {
        let estimate_window = match self.estimate_window_minutes {
            0 => None,
            minutes => Some(TimeDelta::minutes(i64::from(minutes))),
        };
        QueuePolicy {
            max_times_helped: self.max_times_helped,
            estimate_window,
            ..QueuePolicy::default()
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_address", &self.listen_address)
            .field("auth_secret", &"<redacted>")
            .field("max_times_helped", &self.max_times_helped)
            .field("store_path", &self.store_path)
            .field("credentials_path", &self.credentials_path)
            .field("estimate_window_minutes", &self.estimate_window_minutes)
            .field("access", &self.access)
            .finish()
    }
}

/// Staff username to password mapping for basic auth.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    accounts: BTreeMap<String, String>,
}

impl Credentials {
    /// Read a credential file: a flat TOML table of `username = "password"`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read(path)?;
        let credentials: Self = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        if credentials.accounts.is_empty() {
            return Err(ConfigError::Invalid(format!("{} has no accounts", path.display())));
        }
        Ok(credentials)
    }

    /// Build from in-memory pairs.
    pub fn from_pairs<I, U, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        Self { accounts: pairs.into_iter().map(|(u, p)| (u.into(), p.into())).collect() }
    }

    /// Whether `username` exists with `password`.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.accounts
            .get(username)
            .is_some_and(|expected| expected.as_bytes().ct_eq(password.as_bytes()).into())
    }

    /// Number of staff accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("usernames", &self.accounts.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })
}
