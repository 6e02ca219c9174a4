//! State events, drafts and built room events

use crate::content::ContentError;
use crate::id::{EventId, RoomId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Well-known event types
pub mod event_type {
    //! Reserved `m.room.*` event type strings

    /// First event of every room
    pub const CREATE: &str = "m.room.create";
    /// Membership of one user (state key = user id)
    pub const MEMBER: &str = "m.room.member";
    /// Power levels
    pub const POWER_LEVELS: &str = "m.room.power_levels";
    /// Join rules
    pub const JOIN_RULES: &str = "m.room.join_rules";
    /// History visibility
    pub const HISTORY_VISIBILITY: &str = "m.room.history_visibility";
    /// Guest access
    pub const GUEST_ACCESS: &str = "m.room.guest_access";
    /// Room name
    pub const NAME: &str = "m.room.name";
    /// Room topic
    pub const TOPIC: &str = "m.room.topic";
    /// Room avatar
    pub const AVATAR: &str = "m.room.avatar";
    /// Canonical alias designation
    pub const CANONICAL_ALIAS: &str = "m.room.canonical_alias";
    /// Server access-control list
    pub const SERVER_ACL: &str = "m.room.server_acl";
    /// Encryption settings
    pub const ENCRYPTION: &str = "m.room.encryption";
    /// Terminal marker naming a successor room
    pub const TOMBSTONE: &str = "m.room.tombstone";
    /// Third-party invite token
    pub const THIRD_PARTY_INVITE: &str = "m.room.third_party_invite";
}

/// `(event type, state key)` slot in a room's current state
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateTuple {
    /// Event type
    pub event_type: String,
    /// State key (empty string is a distinct, valid key)
    pub state_key: String,
}

impl StateTuple {
    /// Create a new tuple
    #[inline]
    #[must_use]
    pub fn new(event_type: impl Into<String>, state_key: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            state_key: state_key.into(),
        }
    }
}

impl Display for StateTuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.event_type, self.state_key)
    }
}

/// A state event as stored in a room's current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    /// Durable event id (absent for events that were never committed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,
    /// State key
    #[serde(default)]
    pub state_key: String,
    /// Sender identity
    pub sender: UserId,
    /// Opaque content payload
    #[serde(default)]
    pub content: Value,
}

impl StateEvent {
    /// Create an uncommitted state event
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        state_key: impl Into<String>,
        sender: UserId,
        content: Value,
    ) -> Self {
        Self {
            event_id: None,
            event_type: event_type.into(),
            state_key: state_key.into(),
            sender,
            content,
        }
    }

    /// Attach a durable event id
    #[inline]
    #[must_use]
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Slot this event occupies
    #[inline]
    #[must_use]
    pub fn tuple(&self) -> StateTuple {
        StateTuple::new(self.event_type.clone(), self.state_key.clone())
    }

    /// Whether this event has the given type and state key
    #[inline]
    #[must_use]
    pub fn is(&self, event_type: &str, state_key: &str) -> bool {
        self.event_type == event_type && self.state_key == state_key
    }

    /// Deserialize the content into a typed structure
    ///
    /// # Errors
    /// Returns [`ContentError::Malformed`] if the content does not match `T`.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T, ContentError> {
        serde_json::from_value(self.content.clone()).map_err(|source| ContentError::Malformed {
            event_type: self.event_type.clone(),
            source,
        })
    }
}

/// An event about to be built: no id, auth events or position yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Target room
    pub room_id: RoomId,
    /// Sender identity
    pub sender: UserId,
    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,
    /// State key (`None` for message events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Content payload
    pub content: Value,
}

impl EventDraft {
    /// Draft a state event
    #[must_use]
    pub fn state(
        room_id: RoomId,
        sender: UserId,
        event_type: impl Into<String>,
        state_key: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            room_id,
            sender,
            event_type: event_type.into(),
            state_key: Some(state_key.into()),
            content,
        }
    }
}

/// A finalized event ready to be committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Durable event id
    pub event_id: EventId,
    /// Room the event belongs to
    pub room_id: RoomId,
    /// Sender identity
    pub sender: UserId,
    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,
    /// State key (`None` for message events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Content payload
    pub content: Value,
    /// Milliseconds since the unix epoch
    pub origin_server_ts: i64,
    /// Events authorizing this one
    #[serde(default)]
    pub auth_events: Vec<EventId>,
    /// Direct predecessors in the room graph
    #[serde(default)]
    pub prev_events: Vec<EventId>,
    /// Position in the room graph
    #[serde(default)]
    pub depth: u64,
}

impl RoomEvent {
    /// Project a built state event into its current-state form
    #[must_use]
    pub fn to_state_event(&self) -> Option<StateEvent> {
        let state_key = self.state_key.clone()?;
        Some(StateEvent {
            event_id: Some(self.event_id.clone()),
            event_type: self.event_type.clone(),
            state_key,
            sender: self.sender.clone(),
            content: self.content.clone(),
        })
    }
}
