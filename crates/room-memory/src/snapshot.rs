//! JSON snapshots of a homeserver
//!
//! ```json
//! {
//!   "server_name": "example.org",
//!   "rooms": [
//!     { "room_id": "!r:example.org", "room_version": "1", "state": [ ... ] }
//!   ],
//!   "aliases": [
//!     { "alias": "#a:example.org", "room_id": "!r:example.org", "creator": "@u:example.org" }
//!   ]
//! }
//! ```

use crate::directory::AliasBinding;
use room_model::{RoomEvent, RoomId, RoomState, RoomVersionId, ServerName};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Snapshot errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// File could not be read or written
    #[error("snapshot I/O on {path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not valid snapshot JSON
    #[error("snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Parses but cannot be loaded
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

/// One room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room id
    pub room_id: RoomId,
    /// Protocol version
    pub room_version: RoomVersionId,
    /// Current state
    #[serde(default)]
    pub state: RoomState,
    /// Events committed through the server
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<RoomEvent>,
}

/// Whole homeserver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeserverSnapshot {
    /// Server name
    #[serde(default = "ServerName::localhost")]
    pub server_name: ServerName,
    /// Rooms
    #[serde(default)]
    pub rooms: Vec<RoomSnapshot>,
    /// Alias bindings
    #[serde(default)]
    pub aliases: Vec<AliasBinding>,
}

impl HomeserverSnapshot {
    /// Parse from a JSON string
    ///
    /// # Errors
    /// Returns [`SnapshotError::Json`] on malformed input.
    pub fn from_json_str(s: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read and parse a snapshot file
    ///
    /// # Errors
    /// Returns [`SnapshotError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Pretty JSON
    ///
    /// # Errors
    /// Returns [`SnapshotError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty JSON
    ///
    /// # Errors
    /// Returns [`SnapshotError`] if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
