//! Curated state extraction
//!
//! A fixed whitelist, keyed on event type, decides what the successor
//! inherits. Everything not listed in [`EXTRACTION_RULES`] is dropped.
//!
//! | Event type | Rule |
//! |---|---|
//! | `m.room.power_levels` | content verbatim, becomes the power-level override |
//! | `m.room.history_visibility` | value, if it is a known setting |
//! | `m.room.join_rules` | value, if it is a known rule |
//! | `m.room.topic` / `m.room.name` | string, if present |
//! | `m.room.guest_access` | guests may join unless `"forbidden"` |
//! | `m.room.canonical_alias` | deferred until aliases have moved |
//! | avatar, server ACL, encryption | opaque initial state, state key kept |

use crate::create::InitialStateEvent;
use room_model::{
    event_type, CanonicalAliasContent, GuestAccess, HistoryVisibility,
    HistoryVisibilityContent, JoinRule, JoinRulesContent, NameContent, RoomState, StateEvent,
    TopicContent,
};
use serde_json::Value;
use tracing::Span;

/// What the successor inherits from the predecessor
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Power-levels content, verbatim
    pub power_levels: Option<Value>,
    /// History visibility
    pub history_visibility: Option<HistoryVisibility>,
    /// Join rule
    pub join_rule: Option<JoinRule>,
    /// Topic
    pub topic: Option<String>,
    /// Name
    pub name: Option<String>,
    /// Guest access; `true` unless explicitly forbidden
    pub guests_can_join: bool,
    /// Canonical alias, re-emitted after alias migration
    pub canonical_alias: Option<CanonicalAliasContent>,
    /// Opaque entries seeded at creation
    pub initial_state: Vec<InitialStateEvent>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            power_levels: None,
            history_visibility: None,
            join_rule: None,
            topic: None,
            name: None,
            guests_can_join: true,
            canonical_alias: None,
            initial_state: Vec::new(),
        }
    }
}

/// Copies one event's worth of state into the snapshot
pub type Extractor = fn(&StateEvent, &mut StateSnapshot, &Span);

/// The whitelist
pub const EXTRACTION_RULES: &[(&str, Extractor)] = &[
    (event_type::POWER_LEVELS, copy_power_levels),
    (event_type::HISTORY_VISIBILITY, copy_history_visibility),
    (event_type::JOIN_RULES, copy_join_rule),
    (event_type::TOPIC, copy_topic),
    (event_type::NAME, copy_name),
    (event_type::GUEST_ACCESS, copy_guest_access),
    (event_type::CANONICAL_ALIAS, defer_canonical_alias),
    (event_type::AVATAR, copy_initial_state),
    (event_type::SERVER_ACL, copy_initial_state),
    (event_type::ENCRYPTION, copy_initial_state),
];

/// Rule for `event_type`, if whitelisted
#[must_use]
pub fn rule_for(event_type: &str) -> Option<Extractor> {
    EXTRACTION_RULES
        .iter()
        .find(|(ty, _)| *ty == event_type)
        .map(|(_, rule)| *rule)
}

/// Single pass over `state`; the input is never mutated
///
/// Undecodable values are skipped, never fatal.
#[must_use]
pub fn extract(state: &RoomState, span: &Span) -> StateSnapshot {
    let mut snapshot = StateSnapshot::default();
    for event in state.iter() {
        tracing::debug!(
            parent: span,
            event_type = %event.event_type,
            state_key = %event.state_key,
            "considering state event"
        );
        if let Some(rule) = rule_for(&event.event_type) {
            rule(event, &mut snapshot, span);
        }
    }
    snapshot
}

fn copy_power_levels(event: &StateEvent, snapshot: &mut StateSnapshot, _span: &Span) {
    if event.state_key.is_empty() {
        snapshot.power_levels = Some(event.content.clone());
    }
}

fn copy_history_visibility(event: &StateEvent, snapshot: &mut StateSnapshot, _span: &Span) {
    if !event.state_key.is_empty() {
        return;
    }
    if let Ok(content) = event.content_as::<HistoryVisibilityContent>() {
        snapshot.history_visibility = Some(content.history_visibility);
    }
}

fn copy_join_rule(event: &StateEvent, snapshot: &mut StateSnapshot, _span: &Span) {
    if !event.state_key.is_empty() {
        return;
    }
    if let Ok(content) = event.content_as::<JoinRulesContent>() {
        snapshot.join_rule = Some(content.join_rule);
    }
}

fn copy_topic(event: &StateEvent, snapshot: &mut StateSnapshot, _span: &Span) {
    if !event.state_key.is_empty() {
        return;
    }
    if let Ok(content) = event.content_as::<TopicContent>() {
        snapshot.topic = Some(content.topic);
    }
}

fn copy_name(event: &StateEvent, snapshot: &mut StateSnapshot, _span: &Span) {
    if !event.state_key.is_empty() {
        return;
    }
    if let Ok(content) = event.content_as::<NameContent>() {
        snapshot.name = Some(content.name);
    }
}

fn copy_guest_access(event: &StateEvent, snapshot: &mut StateSnapshot, _span: &Span) {
    if event.state_key.is_empty() {
        snapshot.guests_can_join = GuestAccess::from_content(&event.content).can_join();
    }
}

fn defer_canonical_alias(event: &StateEvent, snapshot: &mut StateSnapshot, span: &Span) {
    if !event.state_key.is_empty() {
        return;
    }
    let (content, rejected) = CanonicalAliasContent::from_content_lenient(&event.content);
    for entry in &rejected {
        tracing::warn!(parent: span, alias = %entry, "dropping invalid canonical alias entry");
    }
    snapshot.canonical_alias = Some(content);
}

fn copy_initial_state(event: &StateEvent, snapshot: &mut StateSnapshot, _span: &Span) {
    snapshot.initial_state.push(InitialStateEvent {
        event_type: event.event_type.clone(),
        state_key: event.state_key.clone(),
        content: event.content.clone(),
    });
}
