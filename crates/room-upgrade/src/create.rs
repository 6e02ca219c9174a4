//! Successor room creation request
//!
//! The Room Creator is an external collaborator; this module only shapes
//! what is handed to it and what comes back.

use crate::snapshot::StateSnapshot;
use room_model::{
    EventId, HistoryVisibility, JoinRule, PreviousRoom, RoomId, RoomVersionId,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Opaque state entry seeded into the successor at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialStateEvent {
    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,
    /// Original state key
    #[serde(default)]
    pub state_key: String,
    /// Content, copied verbatim
    pub content: Value,
}

/// Everything the Room Creator needs to instantiate the successor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Pre-allocated successor id
    pub room_id: RoomId,
    /// Protocol version of the successor
    pub room_version: RoomVersionId,
    /// Room name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Room topic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Power levels replacing the creator defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_level_content_override: Option<Value>,
    /// History visibility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_visibility: Option<HistoryVisibility>,
    /// Join rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_rule: Option<JoinRule>,
    /// Guest access flag
    pub guest_can_join: bool,
    /// Opaque initial state entries
    #[serde(default)]
    pub initial_state: Vec<InitialStateEvent>,
    /// Extra `m.room.create` content
    pub creation_content: Value,
}

impl CreateRoomRequest {
    /// Shape a request from the curated snapshot
    #[must_use]
    pub fn from_snapshot(
        room_id: RoomId,
        room_version: RoomVersionId,
        snapshot: &StateSnapshot,
        predecessor: PreviousRoom,
    ) -> Self {
        Self {
            room_id,
            room_version,
            name: snapshot.name.clone(),
            topic: snapshot.topic.clone(),
            power_level_content_override: snapshot.power_levels.clone(),
            history_visibility: snapshot.history_visibility,
            join_rule: snapshot.join_rule,
            guest_can_join: snapshot.guests_can_join,
            initial_state: snapshot.initial_state.clone(),
            creation_content: creation_content(&predecessor.room_id, &predecessor.event_id),
        }
    }

    /// Predecessor back-reference carried in the creation content
    #[must_use]
    pub fn predecessor(&self) -> Option<PreviousRoom> {
        self.creation_content
            .get("predecessor")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}

/// `{"predecessor": {"room_id": .., "event_id": ..}}`
#[must_use]
pub fn creation_content(predecessor: &RoomId, tombstone: &EventId) -> Value {
    json!({
        "predecessor": {
            "room_id": predecessor,
            "event_id": tombstone,
        }
    })
}

/// Successful creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRoom {
    /// Id of the room that now exists
    pub room_id: RoomId,
}

/// Structured creation failure, passed through to the caller verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{errcode}: {error}")]
pub struct CreateRoomError {
    /// HTTP status
    pub status: u16,
    /// Protocol error code
    pub errcode: String,
    /// Human-readable message
    pub error: String,
}

impl CreateRoomError {
    /// Client-side failure (4xx)
    #[must_use]
    pub fn bad_request(errcode: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: 400,
            errcode: errcode.into(),
            error: error.into(),
        }
    }

    /// Server-side failure
    #[must_use]
    pub fn internal(error: impl Into<String>) -> Self {
        Self {
            status: 500,
            errcode: "M_UNKNOWN".to_string(),
            error: error.into(),
        }
    }
}
