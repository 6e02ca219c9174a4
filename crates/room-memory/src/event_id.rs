//! Content-addressed event ids
//!
//! `$` followed by the hex SHA-256 of the event's canonical JSON. Object
//! keys serialize sorted, so equal events hash equally.

use room_model::{EventDraft, EventId, IdError, RoomId, StateEvent};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Event id derivation errors
#[derive(Debug, thiserror::Error)]
pub enum EventIdError {
    /// Event could not be encoded for hashing
    #[error("failed to encode event for hashing: {0}")]
    Encode(#[from] serde_json::Error),

    /// Digest did not form a valid event id
    #[error(transparent)]
    Id(#[from] IdError),
}

/// Id for a freshly built event
///
/// # Errors
/// Returns [`EventIdError::Encode`] if the draft cannot be serialized.
pub fn event_id_for(
    draft: &EventDraft,
    origin_server_ts: i64,
    prev_events: &[EventId],
) -> Result<EventId, EventIdError> {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(draft)?);
    hasher.update(origin_server_ts.to_le_bytes());
    for prev in prev_events {
        hasher.update(prev.as_str().as_bytes());
    }
    digest_to_id(hasher)
}

/// Id for a state event loaded without one
///
/// # Errors
/// Returns [`EventIdError::Encode`] if the event cannot be serialized.
pub fn state_event_id(room_id: &RoomId, event: &StateEvent) -> Result<EventId, EventIdError> {
    let mut hasher = Sha256::new();
    hasher.update(room_id.as_str().as_bytes());
    hasher.update(canonical_bytes(event)?);
    digest_to_id(hasher)
}

fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EventIdError> {
    Ok(serde_json::to_vec(value)?)
}

fn digest_to_id(hasher: Sha256) -> Result<EventId, EventIdError> {
    Ok(format!("${}", hex::encode(hasher.finalize())).parse()?)
}
