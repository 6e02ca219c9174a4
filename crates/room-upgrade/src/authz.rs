//! Requester authorization
//!
//! Runs after the current state is fetched and before any write. A room
//! without power levels imposes no restriction.

use crate::error::UpgradeError;
use crate::stage::UpgradeStage;
use room_model::{RoomState, UserId};
use tracing::Span;

/// Message returned to unprivileged requesters
pub const FORBIDDEN_MESSAGE: &str = "User is not allowed to set state event";

/// Check that `requester` clears the predecessor's `state_default`
///
/// # Errors
/// - [`UpgradeError::Forbidden`] if the requester's level is too low
/// - [`UpgradeError::Internal`] if the power-levels content is malformed
pub fn authorize(requester: &UserId, state: &RoomState, span: &Span) -> Result<(), UpgradeError> {
    let levels = state
        .power_levels()
        .map_err(|e| UpgradeError::internal(UpgradeStage::Authorized, e))?;

    let Some(levels) = levels else {
        tracing::debug!(parent: span, "no power levels in room, upgrade unrestricted");
        return Ok(());
    };

    let level = levels.user_level(requester);
    if level < levels.state_default {
        tracing::info!(
            parent: span,
            level,
            state_default = levels.state_default,
            "requester below state_default"
        );
        return Err(UpgradeError::Forbidden(FORBIDDEN_MESSAGE.to_string()));
    }

    tracing::debug!(parent: span, level, "requester authorized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_model::{event_type, StateEvent};
    use serde_json::json;

    fn user(s: &str) -> UserId {
        s.parse().unwrap()
    }

    fn state_with_levels(content: serde_json::Value) -> RoomState {
        vec![StateEvent::new(
            event_type::POWER_LEVELS,
            "",
            user("@admin:x"),
            content,
        )]
        .into()
    }

    #[test]
    fn no_power_levels_means_no_restriction() {
        assert!(authorize(&user("@anyone:x"), &RoomState::new(), &Span::none()).is_ok());
    }

    #[test]
    fn level_at_threshold_is_enough() {
        let state = state_with_levels(json!({"users": {"@mod:x": 50}, "state_default": 50}));
        assert!(authorize(&user("@mod:x"), &state, &Span::none()).is_ok());
    }

    #[test]
    fn level_below_threshold_is_forbidden() {
        let state = state_with_levels(json!({"users": {"@mod:x": 50}, "state_default": 51}));
        let err = authorize(&user("@mod:x"), &state, &Span::none()).unwrap_err();
        assert!(matches!(err, UpgradeError::Forbidden(ref m) if m == FORBIDDEN_MESSAGE));
    }

    #[test]
    fn users_default_applies_to_unlisted() {
        let state = state_with_levels(json!({"users_default": 60, "state_default": 50}));
        assert!(authorize(&user("@stranger:x"), &state, &Span::none()).is_ok());
    }

    #[test]
    fn malformed_power_levels_fail_closed() {
        let state = state_with_levels(json!({"state_default": "lots"}));
        let err = authorize(&user("@admin:x"), &state, &Span::none()).unwrap_err();
        assert!(matches!(err, UpgradeError::Internal { .. }));
        assert!(err.predecessor_untouched());
    }
}
