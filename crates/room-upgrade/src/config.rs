//! Upgrade configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! server_name = "example.org"
//! supported_versions = ["9", "10", "11"]
//! default_room_version = "10"
//! tombstone_body = "This room has been replaced"
//! successor_localpart_len = 16
//! purge_aliases = true
//! ```
//!
//! Every key is optional.

use room_model::{RoomVersionId, ServerName, KNOWN_ROOM_VERSIONS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Upgrade configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Server successor rooms are minted on
    pub server_name: ServerName,
    /// Versions clients may upgrade to
    pub supported_versions: Vec<RoomVersionId>,
    /// Version suggested when none is given
    pub default_room_version: RoomVersionId,
    /// `body` of the tombstone event
    pub tombstone_body: String,
    /// Random characters in a successor room id
    pub successor_localpart_len: usize,
    /// Force alias removal from the predecessor
    pub purge_aliases: bool,
}

impl UpgradeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With server name
    #[inline]
    #[must_use]
    pub fn with_server_name(mut self, server_name: ServerName) -> Self {
        self.server_name = server_name;
        self
    }

    /// With supported versions
    #[must_use]
    pub fn with_supported_versions<I, V>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RoomVersionId>,
    {
        self.supported_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// With tombstone body
    #[inline]
    #[must_use]
    pub fn with_tombstone_body(mut self, body: impl Into<String>) -> Self {
        self.tombstone_body = body.into();
        self
    }

    /// With alias purge flag
    #[inline]
    #[must_use]
    pub fn with_purge_aliases(mut self, purge: bool) -> Self {
        self.purge_aliases = purge;
        self
    }

    /// Parse from TOML text and validate
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is unreadable or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check invariants serde cannot express
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.successor_localpart_len == 0 {
            return Err(ConfigError::Invalid(
                "successor_localpart_len must be at least 1".to_string(),
            ));
        }
        if self.supported_versions.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_versions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            server_name: ServerName::localhost(),
            supported_versions: KNOWN_ROOM_VERSIONS
                .iter()
                .map(|v| RoomVersionId::from(*v))
                .collect(),
            default_room_version: RoomVersionId::from("10"),
            tombstone_body: "This room has been replaced".to_string(),
            successor_localpart_len: 16,
            purge_aliases: true,
        }
    }
}
