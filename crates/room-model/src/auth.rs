//! Authorization dependencies of new events
//!
//! Given a draft, computes which current-state slots must be cited as auth
//! events. Mirrors the protocol's auth-event selection rules.

use crate::content::{MemberContent, Membership};
use crate::event::{event_type, EventDraft, StateTuple};
use std::collections::BTreeSet;

/// State slots an event needs for authorization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateNeeded {
    tuples: BTreeSet<StateTuple>,
}

impl StateNeeded {
    /// Add a slot
    pub fn add(&mut self, tuple: StateTuple) {
        self.tuples.insert(tuple);
    }

    /// Slots in deterministic order
    pub fn tuples(&self) -> impl Iterator<Item = &StateTuple> {
        self.tuples.iter()
    }

    /// Number of slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// Whether no slot is needed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl FromIterator<StateTuple> for StateNeeded {
    fn from_iter<I: IntoIterator<Item = StateTuple>>(iter: I) -> Self {
        Self {
            tuples: iter.into_iter().collect(),
        }
    }
}

/// Slots `draft` must cite as auth events
///
/// `m.room.create` needs nothing. Every other event needs the create event,
/// the power levels and the sender's membership. Membership events also need
/// the target's membership, and joins/invites/knocks need the join rules.
#[must_use]
pub fn state_needed(draft: &EventDraft) -> StateNeeded {
    let mut needed = StateNeeded::default();
    if draft.event_type == event_type::CREATE {
        return needed;
    }

    needed.add(StateTuple::new(event_type::CREATE, ""));
    needed.add(StateTuple::new(event_type::POWER_LEVELS, ""));
    needed.add(StateTuple::new(event_type::MEMBER, draft.sender.as_str()));

    if draft.event_type == event_type::MEMBER {
        if let Some(target) = &draft.state_key {
            needed.add(StateTuple::new(event_type::MEMBER, target.clone()));
        }
        let membership = serde_json::from_value::<MemberContent>(draft.content.clone())
            .map(|c| c.membership)
            .ok();
        if matches!(
            membership,
            Some(Membership::Join | Membership::Invite | Membership::Knock)
        ) {
            needed.add(StateTuple::new(event_type::JOIN_RULES, ""));
        }
        if draft.content.get("third_party_invite").is_some() {
            if let Some(token) = draft
                .content
                .pointer("/third_party_invite/signed/token")
                .and_then(serde_json::Value::as_str)
            {
                needed.add(StateTuple::new(event_type::THIRD_PARTY_INVITE, token));
            }
        }
    }

    needed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{RoomId, UserId};
    use serde_json::json;

    fn draft(event_type: &str, state_key: &str, content: serde_json::Value) -> EventDraft {
        let room: RoomId = "!r:x".parse().unwrap();
        let sender: UserId = "@alice:x".parse().unwrap();
        EventDraft::state(room, sender, event_type, state_key, content)
    }

    #[test]
    fn create_needs_nothing() {
        assert!(state_needed(&draft(event_type::CREATE, "", json!({}))).is_empty());
    }

    #[test]
    fn tombstone_needs_create_power_levels_and_sender() {
        let needed = state_needed(&draft(event_type::TOMBSTONE, "", json!({})));
        let tuples: Vec<_> = needed.tuples().cloned().collect();
        assert_eq!(
            tuples,
            vec![
                StateTuple::new(event_type::CREATE, ""),
                StateTuple::new(event_type::MEMBER, "@alice:x"),
                StateTuple::new(event_type::POWER_LEVELS, ""),
            ]
        );
    }

    #[test]
    fn join_needs_join_rules_and_target() {
        let needed = state_needed(&draft(
            event_type::MEMBER,
            "@bob:x",
            json!({"membership": "join"}),
        ));
        assert!(needed
            .tuples()
            .any(|t| t == &StateTuple::new(event_type::JOIN_RULES, "")));
        assert!(needed
            .tuples()
            .any(|t| t == &StateTuple::new(event_type::MEMBER, "@bob:x")));
        assert_eq!(needed.len(), 5);
    }
}
