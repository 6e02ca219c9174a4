//! Current-state map of a room

use crate::content::{ContentError, CreateContent, MemberContent, Membership};
use crate::event::{event_type, StateEvent, StateTuple};
use crate::id::UserId;
use crate::power_levels::PowerLevels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current state of a room: one event per `(type, state key)` slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<StateEvent>", into = "Vec<StateEvent>")]
pub struct RoomState {
    events: BTreeMap<StateTuple, StateEvent>,
}

impl RoomState {
    /// Empty state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event, replacing whatever held its slot
    pub fn insert(&mut self, event: StateEvent) -> Option<StateEvent> {
        self.events.insert(event.tuple(), event)
    }

    /// Event in the `(event_type, state_key)` slot
    #[must_use]
    pub fn get(&self, event_type: &str, state_key: &str) -> Option<&StateEvent> {
        self.events.get(&StateTuple::new(event_type, state_key))
    }

    /// Event in the given slot
    #[inline]
    #[must_use]
    pub fn get_tuple(&self, tuple: &StateTuple) -> Option<&StateEvent> {
        self.events.get(tuple)
    }

    /// Iterate events in slot order
    pub fn iter(&self) -> impl Iterator<Item = &StateEvent> {
        self.events.values()
    }

    /// Number of occupied slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no slot is occupied
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Parsed power levels, if the room has them
    ///
    /// # Errors
    /// Returns [`ContentError`] if the power-levels content is malformed.
    pub fn power_levels(&self) -> Result<Option<PowerLevels>, ContentError> {
        self.get(event_type::POWER_LEVELS, "")
            .map(StateEvent::content_as)
            .transpose()
    }

    /// Parsed creation content, if present
    ///
    /// # Errors
    /// Returns [`ContentError`] if the create content is malformed.
    pub fn create_content(&self) -> Result<Option<CreateContent>, ContentError> {
        self.get(event_type::CREATE, "")
            .map(StateEvent::content_as)
            .transpose()
    }

    /// Membership of `user`, if any
    #[must_use]
    pub fn membership(&self, user: &UserId) -> Option<Membership> {
        self.get(event_type::MEMBER, user.as_str())
            .and_then(|ev| ev.content_as::<MemberContent>().ok())
            .map(|c| c.membership)
    }
}

impl From<Vec<StateEvent>> for RoomState {
    fn from(events: Vec<StateEvent>) -> Self {
        events.into_iter().collect()
    }
}

impl From<RoomState> for Vec<StateEvent> {
    fn from(state: RoomState) -> Self {
        state.events.into_values().collect()
    }
}

impl FromIterator<StateEvent> for RoomState {
    fn from_iter<I: IntoIterator<Item = StateEvent>>(iter: I) -> Self {
        let mut state = Self::new();
        for event in iter {
            state.insert(event);
        }
        state
    }
}
