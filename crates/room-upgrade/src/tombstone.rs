//! Tombstone publishing
//!
//! The tombstone names a successor that does not exist yet; its id must
//! already be allocated.

use crate::error::UpgradeError;
use crate::send::send_state_event;
use crate::services::UpgradeServices;
use crate::stage::UpgradeStage;
use room_model::{event_type, EventDraft, EventId, RoomId, RoomState, UserId};
use serde_json::json;
use tracing::Span;

/// Draft the `m.room.tombstone` event for `predecessor`
#[must_use]
pub fn tombstone_draft(
    predecessor: &RoomId,
    sender: &UserId,
    body: &str,
    successor: &RoomId,
) -> EventDraft {
    EventDraft::state(
        predecessor.clone(),
        sender.clone(),
        event_type::TOMBSTONE,
        "",
        json!({"body": body, "replacement_room": successor}),
    )
}

/// Commit the tombstone and return its event id
///
/// # Errors
/// Returns [`UpgradeError::Internal`] tagged [`UpgradeStage::Tombstoned`];
/// nothing has been written to the predecessor in that case.
pub async fn publish_tombstone(
    services: &UpgradeServices,
    predecessor: &RoomId,
    sender: &UserId,
    body: &str,
    successor: &RoomId,
    state: &RoomState,
    span: &Span,
) -> Result<EventId, UpgradeError> {
    let draft = tombstone_draft(predecessor, sender, body, successor);
    let event_id =
        send_state_event(services, draft, state, UpgradeStage::Tombstoned, span).await?;
    tracing::info!(parent: span, tombstone = %event_id, %successor, "tombstone committed");
    Ok(event_id)
}
