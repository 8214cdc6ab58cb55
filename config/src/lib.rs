//! Configuration loading for articheck.
//!
//! A single optional TOML file configures the external data provider's
//! endpoints. Every field has a default pointing at the public provider, so
//! a missing config file is not an error - only a malformed one is.
//!
//! Resolution order for the file path:
//! 1. `ARTICHECK_CONFIG` environment variable, if set;
//! 2. `~/.articheck/config.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default endpoint for the institution directory (static JSON).
pub const DEFAULT_INSTITUTIONS_URL: &str =
    "https://articheck-data.s3.us-west-1.amazonaws.com/institutions_state.json";
/// Default endpoint for the community-college directory (static JSON).
pub const DEFAULT_COLLEGES_URL: &str =
    "https://articheck-data.s3.us-west-1.amazonaws.com/colleges.json";
/// Default endpoint for the per-institution course listing.
pub const DEFAULT_COURSES_URL: &str =
    "https://lzlnwhushmmp5jnpzqed6x4qa40dfsjr.lambda-url.us-west-1.on.aws";
/// Default endpoint for the per-course articulation payload.
pub const DEFAULT_ARTICULATIONS_URL: &str =
    "https://5eqjf6ysqgsoyr2ln34dfigeim0naiez.lambda-url.us-west-1.on.aws";

/// Errors raised while loading configuration.
///
/// Only surfaced for files that exist but cannot be used; a missing file
/// silently yields [`Config::default`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Provider endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    pub institutions_url: String,
    pub colleges_url: String,
    pub courses_url: String,
    pub articulations_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            institutions_url: DEFAULT_INSTITUTIONS_URL.to_string(),
            colleges_url: DEFAULT_COLLEGES_URL.to_string(),
            courses_url: DEFAULT_COURSES_URL.to_string(),
            articulations_url: DEFAULT_ARTICULATIONS_URL.to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub endpoints: Endpoints,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the resolved config path, falling back to defaults when no
    /// file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&path, &text)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// Resolve the config file path. `None` when no home directory exists and
/// no override is set.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("ARTICHECK_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".articheck").join("config.toml"))
}
