//! core::config
//!
//! Connection configuration for the hosted API.
//!
//! # Design
//!
//! [`ForgeConfig`] is the fixed, validated configuration consumed by the
//! forge layer: credentials, repository coordinates, and the API base URL.
//! Validation happens at construction, not at call time, so a constructed
//! config is always usable.
//!
//! [`FileConfig`] is the optional on-disk TOML file. Located at (in order
//! of precedence):
//! 1. `$GRAFT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/graft/config.toml` (via `dirs`)
//!
//! The CLI merges sources with flag > environment > file > default
//! precedence; the library only ever sees the merged [`ForgeConfig`].
//!
//! # Example
//!
//! ```
//! use graftwork::core::config::ForgeConfig;
//!
//! let config = ForgeConfig::new(
//!     Some("whiskeyriver".to_string()),
//!     "s3cret".to_string(),
//!     "whiskeyriver",
//!     "ghpick_test",
//!     None,
//! )
//! .unwrap();
//! assert_eq!(config.api_base, "https://api.github.com");
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default public API base URL. Enterprise installations override this
/// with their own prefix (e.g. `https://gh.internal.com/api/v3`).
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is missing or empty.
    #[error("missing config value: {0}")]
    Missing(&'static str),

    /// A field value is present but invalid.
    #[error("invalid config value: {0}")]
    InvalidValue(String),

    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file exists but could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Validated connection configuration.
///
/// Recognized fields are fixed: `username`, `token` (a password for basic
/// auth or a personal access token), `organization`, `repository`, and
/// `api_base`. Nothing else is consulted at call time.
#[derive(Clone, PartialEq, Eq)]
pub struct ForgeConfig {
    /// Account name. When present, requests use basic auth with `token` as
    /// the password; when absent, `token` is sent as a bearer token.
    pub username: Option<String>,
    /// Password or personal access token.
    pub token: String,
    /// Repository owner (user or organization).
    pub organization: String,
    /// Repository name.
    pub repository: String,
    /// API base URL.
    pub api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for ForgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeConfig")
            .field("username", &self.username)
            .field("has_token", &!self.token.is_empty())
            .field("organization", &self.organization)
            .field("repository", &self.repository)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ForgeConfig {
    /// Create a validated configuration.
    ///
    /// `api_base` falls back to [`DEFAULT_API_BASE`]; a trailing slash is
    /// trimmed so URL building can always join with `/`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the token is empty, the organization or
    /// repository is empty or contains `/`, or the API base is not an
    /// http(s) URL.
    pub fn new(
        username: Option<String>,
        token: String,
        organization: impl Into<String>,
        repository: impl Into<String>,
        api_base: Option<String>,
    ) -> Result<Self, ConfigError> {
        let organization = organization.into();
        let repository = repository.into();

        if token.is_empty() {
            return Err(ConfigError::Missing("token"));
        }
        if organization.is_empty() {
            return Err(ConfigError::Missing("organization"));
        }
        if repository.is_empty() {
            return Err(ConfigError::Missing("repository"));
        }
        for (label, value) in [("organization", &organization), ("repository", &repository)] {
            if value.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "{label} cannot contain '/': {value}"
                )));
            }
        }

        let api_base = api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
            return Err(ConfigError::InvalidValue(format!(
                "api_base must be an http(s) URL: {api_base}"
            )));
        }
        let api_base = api_base.trim_end_matches('/').to_string();

        Ok(Self {
            username,
            token,
            organization,
            repository,
            api_base,
        })
    }
}

/// On-disk configuration file (all fields optional).
///
/// # Example
///
/// ```toml
/// organization = "whiskeyriver"
/// repository = "ghpick_test"
/// username = "whiskeyriver"
/// api_base = "https://gh.internal.com/api/v3"
/// ```
///
/// Tokens are intentionally not a file field; supply them via `--token`,
/// `$GRAFT_TOKEN`, or the interactive prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Default repository owner.
    pub organization: Option<String>,

    /// Default repository name.
    pub repository: Option<String>,

    /// Default account name for basic auth.
    pub username: Option<String>,

    /// Default API base URL.
    pub api_base: Option<String>,
}

impl FileConfig {
    /// Locate the config file, honoring `$GRAFT_CONFIG`.
    pub fn path() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var("GRAFT_CONFIG") {
            if !explicit.is_empty() {
                return Some(PathBuf::from(explicit));
            }
        }
        dirs::config_dir().map(|dir| dir.join("graft").join("config.toml"))
    }

    /// Load the config file if it exists.
    ///
    /// A missing file is not an error; a present-but-unreadable or
    /// unparseable file is.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = Self::path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        Ok(Some(parsed))
    }
}
