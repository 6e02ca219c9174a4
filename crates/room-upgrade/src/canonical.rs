//! Canonical alias republish
//!
//! Runs after alias migration. The designation is rebuilt against the
//! successor's own current state, so it must be fetched first.

use crate::error::{InternalError, UpgradeError};
use crate::send::send_state_event;
use crate::services::UpgradeServices;
use crate::stage::UpgradeStage;
use room_model::{event_type, CanonicalAliasContent, EventDraft, EventId, RoomId, UserId};
use serde_json::json;
use tracing::Span;

/// Draft `m.room.canonical_alias` for the successor
#[must_use]
pub fn canonical_alias_draft(
    successor: &RoomId,
    sender: &UserId,
    content: &CanonicalAliasContent,
) -> EventDraft {
    let mut body = json!({ "alt_aliases": content.alt_aliases });
    if let Some(alias) = &content.alias {
        body["alias"] = json!(alias);
    }
    EventDraft::state(
        successor.clone(),
        sender.clone(),
        event_type::CANONICAL_ALIAS,
        "",
        body,
    )
}

/// Re-emit the predecessor's designation in `successor`
///
/// # Errors
/// Returns [`UpgradeError::Internal`] tagged
/// [`UpgradeStage::CanonicalRepublished`]. The successor exists either way.
pub async fn republish_canonical_alias(
    services: &UpgradeServices,
    successor: &RoomId,
    sender: &UserId,
    content: &CanonicalAliasContent,
    span: &Span,
) -> Result<EventId, UpgradeError> {
    let state = services
        .rooms
        .current_state(successor)
        .await
        .map_err(|e| {
            tracing::error!(parent: span, %successor, error = %e, "successor state query failed");
            UpgradeError::internal(
                UpgradeStage::CanonicalRepublished,
                InternalError::StateQuery(e),
            )
        })?;

    let draft = canonical_alias_draft(successor, sender, content);
    let event_id = send_state_event(
        services,
        draft,
        &state,
        UpgradeStage::CanonicalRepublished,
        span,
    )
    .await?;

    tracing::info!(parent: span, %event_id, "canonical alias republished");
    Ok(event_id)
}
