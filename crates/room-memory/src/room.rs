//! A single room held in memory

use crate::event_id::{event_id_for, state_event_id, EventIdError};
use room_model::{
    EventDraft, EventId, RoomEvent, RoomId, RoomState, RoomVersionId, StateEvent,
    StateNeeded,
};

/// Room version, current state and event log
#[derive(Debug, Clone)]
pub struct MemoryRoom {
    room_id: RoomId,
    version: RoomVersionId,
    state: RoomState,
    events: Vec<RoomEvent>,
    depth: u64,
    forward_extremity: Option<EventId>,
}

impl MemoryRoom {
    /// Empty room
    #[must_use]
    pub fn new(room_id: RoomId, version: RoomVersionId) -> Self {
        Self {
            room_id,
            version,
            state: RoomState::new(),
            events: Vec::new(),
            depth: 0,
            forward_extremity: None,
        }
    }

    /// Room seeded with existing state and history
    ///
    /// State events without an id get a content-addressed one.
    ///
    /// # Errors
    /// Returns [`EventIdError`] if an id cannot be derived.
    pub fn with_history(
        room_id: RoomId,
        version: RoomVersionId,
        state: RoomState,
        events: Vec<RoomEvent>,
    ) -> Result<Self, EventIdError> {
        let mut room = Self::new(room_id, version);
        for mut event in Vec::<StateEvent>::from(state) {
            if event.event_id.is_none() {
                event.event_id = Some(state_event_id(&room.room_id, &event)?);
            }
            room.depth += 1;
            room.forward_extremity.clone_from(&event.event_id);
            room.state.insert(event);
        }
        for event in events {
            room.depth = room.depth.max(event.depth);
            room.forward_extremity = Some(event.event_id.clone());
            room.events.push(event);
        }
        Ok(room)
    }

    /// Room id
    #[inline]
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Protocol version
    #[inline]
    #[must_use]
    pub fn version(&self) -> &RoomVersionId {
        &self.version
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// Events committed through this server, oldest first
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[RoomEvent] {
        &self.events
    }

    /// Finalize `draft`, citing `needed` slots of `state` as auth events
    ///
    /// # Errors
    /// Returns [`EventIdError`] if the event id cannot be derived.
    pub fn build(
        &self,
        draft: &EventDraft,
        needed: &StateNeeded,
        state: &RoomState,
        origin_server_ts: i64,
    ) -> Result<RoomEvent, EventIdError> {
        let auth_events = needed
            .tuples()
            .filter_map(|tuple| state.get_tuple(tuple))
            .filter_map(|event| event.event_id.clone())
            .collect();
        let prev_events: Vec<EventId> = self.forward_extremity.iter().cloned().collect();
        let event_id = event_id_for(draft, origin_server_ts, &prev_events)?;

        Ok(RoomEvent {
            event_id,
            room_id: draft.room_id.clone(),
            sender: draft.sender.clone(),
            event_type: draft.event_type.clone(),
            state_key: draft.state_key.clone(),
            content: draft.content.clone(),
            origin_server_ts,
            auth_events,
            prev_events,
            depth: self.depth + 1,
        })
    }

    /// Append a built event, applying it to state if it is a state event
    pub fn append(&mut self, event: RoomEvent) {
        if let Some(state_event) = event.to_state_event() {
            self.state.insert(state_event);
        }
        self.depth = self.depth.max(event.depth);
        self.forward_extremity = Some(event.event_id.clone());
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_model::{event_type, state_needed};
    use serde_json::json;

    fn room() -> MemoryRoom {
        let creator = "@a:x".parse().unwrap();
        let state: RoomState = vec![StateEvent::new(
            event_type::CREATE,
            "",
            creator,
            json!({"creator": "@a:x"}),
        )]
        .into();
        MemoryRoom::with_history("!r:x".parse().unwrap(), "1".into(), state, vec![]).unwrap()
    }

    #[test]
    fn loaded_state_gets_ids() {
        let room = room();
        let create = room.state().get(event_type::CREATE, "").unwrap();
        assert!(create.event_id.is_some());
    }

    #[test]
    fn build_and_append_links_events() {
        let mut room = room();
        let draft = EventDraft::state(
            room.room_id().clone(),
            "@a:x".parse().unwrap(),
            event_type::NAME,
            "",
            json!({"name": "Lobby"}),
        );
        let needed = state_needed(&draft);
        let event = room.build(&draft, &needed, room.state(), 42).unwrap();

        let create_id = room.state().get(event_type::CREATE, "").unwrap().event_id.clone();
        assert_eq!(event.auth_events, create_id.iter().cloned().collect::<Vec<_>>());
        assert_eq!(event.prev_events, create_id.iter().cloned().collect::<Vec<_>>());
        assert_eq!(event.depth, 2);

        room.append(event.clone());
        assert_eq!(room.events().len(), 1);
        let name = room.state().get(event_type::NAME, "").unwrap();
        assert_eq!(name.event_id.as_ref(), Some(&event.event_id));
    }
}
