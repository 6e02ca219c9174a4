//! Room versions and their event formats

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Stable room versions this runtime can produce events for
pub const KNOWN_ROOM_VERSIONS: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11"];

/// Room version identifier (`"1"`, `"10"`, `"org.example.custom"`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomVersionId(String);

/// Wire format of events in a room version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFormat {
    /// Server-scoped event ids (`$local:server`)
    V1,
    /// Reference-hash event ids, standard base64
    V2,
    /// Reference-hash event ids, URL-safe base64
    V3,
}

/// Version has no known event format
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported room version: {0}")]
pub struct UnsupportedRoomVersion(pub String);

impl RoomVersionId {
    /// Wrap a raw version string
    #[inline]
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Event format used by this version
    ///
    /// # Errors
    /// Returns [`UnsupportedRoomVersion`] for versions outside
    /// [`KNOWN_ROOM_VERSIONS`].
    pub fn event_format(&self) -> Result<EventFormat, UnsupportedRoomVersion> {
        match self.0.as_str() {
            "1" | "2" => Ok(EventFormat::V1),
            "3" => Ok(EventFormat::V2),
            "4" | "5" | "6" | "7" | "8" | "9" | "10" | "11" => Ok(EventFormat::V3),
            other => Err(UnsupportedRoomVersion(other.to_string())),
        }
    }

    /// Whether events in this version can be produced
    #[inline]
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.event_format().is_ok()
    }
}

impl From<&str> for RoomVersionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoomVersionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for RoomVersionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
