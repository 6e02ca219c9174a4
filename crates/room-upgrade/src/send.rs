//! Draft, build and commit one state event
//!
//! Shared by the tombstone publisher and the canonical alias republisher.
//! Failures are tagged with the stage being attempted so the caller's
//! terminal state follows from where the pipeline stopped.

use crate::error::{InternalError, UpgradeError};
use crate::services::{EventKind, UpgradeServices};
use crate::stage::UpgradeStage;
use chrono::Utc;
use room_model::{EventDraft, EventId, RoomState};
use tracing::Span;

/// Resolve dependencies, build against `state`, commit as a new event
///
/// # Errors
/// Returns [`UpgradeError::Internal`] if dependencies cannot be resolved or
/// come back empty, or if building or committing fails.
pub async fn send_state_event(
    services: &UpgradeServices,
    draft: EventDraft,
    state: &RoomState,
    during: UpgradeStage,
    span: &Span,
) -> Result<EventId, UpgradeError> {
    let event_type = draft.event_type.clone();

    let needed = services.events.state_needed(&draft).await.map_err(|source| {
        tracing::error!(parent: span, %event_type, error = %source, "dependency resolution failed");
        UpgradeError::internal(
            during,
            InternalError::DependencyResolution {
                event_type: event_type.clone(),
                source,
            },
        )
    })?;

    if needed.is_empty() {
        tracing::error!(parent: span, %event_type, "event has no auth dependencies");
        return Err(UpgradeError::internal(
            during,
            InternalError::NoDependencies { event_type },
        ));
    }

    let event = services
        .events
        .build_event(&draft, &needed, Utc::now(), state)
        .await
        .map_err(|source| {
            tracing::error!(parent: span, %event_type, error = %source, "event build failed");
            UpgradeError::internal(
                during,
                InternalError::Build {
                    event_type: event_type.clone(),
                    source,
                },
            )
        })?;

    let event_id = event.event_id.clone();
    services
        .sink
        .commit(&draft.room_id, event, EventKind::New)
        .await
        .map_err(|source| {
            tracing::error!(parent: span, %event_type, error = %source, "event commit failed");
            UpgradeError::internal(
                during,
                InternalError::Commit {
                    event_type: event_type.clone(),
                    source,
                },
            )
        })?;

    tracing::debug!(parent: span, %event_type, %event_id, room_id = %draft.room_id, "event committed");
    Ok(event_id)
}
