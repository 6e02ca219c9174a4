//! In-memory homeserver
//!
//! Implements every collaborator an upgrade talks to:
//! - [`RoomQuery`]: versions and current state
//! - [`EventAuthority`]: auth-dependency selection and event building
//! - [`EventSink`]: committing built events
//! - [`RoomCreator`]: materializing new rooms
//! - [`AliasDirectory`]: alias bindings
//!
//! Locks are never held across an await point.

use crate::creator::creation_drafts;
use crate::directory::{AliasBinding, AliasTable};
use crate::room::MemoryRoom;
use crate::snapshot::{HomeserverSnapshot, RoomSnapshot, SnapshotError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use room_model::{
    event_type, state_needed, CanonicalAliasContent, EventDraft, RoomAliasId, RoomEvent, RoomId,
    RoomState, RoomVersionId, ServerName, StateEvent, StateNeeded, UserId,
};
use room_upgrade::{
    AliasDirectory, CreateRoomError, CreateRoomRequest, CreatedRoom, EventAuthority, EventKind,
    EventSink, RoomCreator, RoomQuery, ServiceError,
};
use std::collections::BTreeMap;

/// Homeserver holding every room and alias in memory
#[derive(Debug)]
pub struct MemoryHomeserver {
    server_name: ServerName,
    rooms: RwLock<BTreeMap<RoomId, MemoryRoom>>,
    aliases: RwLock<AliasTable>,
}

impl MemoryHomeserver {
    /// Empty homeserver
    #[must_use]
    pub fn new(server_name: ServerName) -> Self {
        Self {
            server_name,
            rooms: RwLock::new(BTreeMap::new()),
            aliases: RwLock::new(AliasTable::default()),
        }
    }

    /// Server name
    #[inline]
    #[must_use]
    pub fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    /// Add a room with existing state
    ///
    /// # Errors
    /// Returns [`ServiceError::Conflict`] if the room exists.
    pub fn insert_room(
        &self,
        room_id: RoomId,
        version: RoomVersionId,
        state: impl IntoIterator<Item = StateEvent>,
    ) -> Result<(), ServiceError> {
        self.insert_room_with_history(room_id, version, state.into_iter().collect(), Vec::new())
    }

    fn insert_room_with_history(
        &self,
        room_id: RoomId,
        version: RoomVersionId,
        state: RoomState,
        events: Vec<RoomEvent>,
    ) -> Result<(), ServiceError> {
        let mut rooms = self.rooms.write();
        if rooms.contains_key(&room_id) {
            return Err(ServiceError::Conflict(format!("room {room_id} already exists")));
        }
        let room = MemoryRoom::with_history(room_id.clone(), version, state, events)
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        rooms.insert(room_id, room);
        Ok(())
    }

    /// Bind `alias` to `room_id`
    ///
    /// # Errors
    /// - [`ServiceError::NotFound`] if the room is unknown
    /// - [`ServiceError::Conflict`] if the alias is already bound
    pub fn bind_alias(
        &self,
        alias: RoomAliasId,
        room_id: RoomId,
        creator: UserId,
    ) -> Result<(), ServiceError> {
        if !self.rooms.read().contains_key(&room_id) {
            return Err(ServiceError::NotFound(format!("room {room_id}")));
        }
        self.aliases.write().bind(AliasBinding {
            alias,
            room_id,
            creator,
        })
    }

    /// Ids of every room
    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().keys().cloned().collect()
    }

    /// Number of rooms
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Current state of `room_id`
    #[must_use]
    pub fn state_of(&self, room_id: &RoomId) -> Option<RoomState> {
        self.rooms.read().get(room_id).map(|r| r.state().clone())
    }

    /// Version of `room_id`
    #[must_use]
    pub fn version_of(&self, room_id: &RoomId) -> Option<RoomVersionId> {
        self.rooms.read().get(room_id).map(|r| r.version().clone())
    }

    /// Events committed into `room_id`, oldest first
    #[must_use]
    pub fn events_of(&self, room_id: &RoomId) -> Vec<RoomEvent> {
        self.rooms
            .read()
            .get(room_id)
            .map(|r| r.events().to_vec())
            .unwrap_or_default()
    }

    /// Room `alias` resolves to
    #[must_use]
    pub fn resolve_alias(&self, alias: &RoomAliasId) -> Option<RoomId> {
        self.aliases.read().resolve(alias).cloned()
    }

    /// Aliases resolving to `room_id`
    #[must_use]
    pub fn aliases_of(&self, room_id: &RoomId) -> Vec<RoomAliasId> {
        self.aliases.read().aliases_of(room_id)
    }

    /// Load from a snapshot
    ///
    /// # Errors
    /// Returns [`SnapshotError::Invalid`] for duplicate rooms or aliases, or
    /// aliases pointing at unknown rooms.
    pub fn from_snapshot(snapshot: HomeserverSnapshot) -> Result<Self, SnapshotError> {
        let hs = Self::new(snapshot.server_name);
        for room in snapshot.rooms {
            hs.insert_room_with_history(room.room_id, room.room_version, room.state, room.events)
                .map_err(|e| SnapshotError::Invalid(e.to_string()))?;
        }
        for binding in snapshot.aliases {
            hs.bind_alias(binding.alias, binding.room_id, binding.creator)
                .map_err(|e| SnapshotError::Invalid(e.to_string()))?;
        }
        tracing::debug!(
            server_name = %hs.server_name,
            rooms = hs.room_count(),
            aliases = hs.aliases.read().len(),
            "homeserver loaded"
        );
        Ok(hs)
    }

    /// Dump to a snapshot
    #[must_use]
    pub fn snapshot(&self) -> HomeserverSnapshot {
        let rooms = self
            .rooms
            .read()
            .values()
            .map(|room| RoomSnapshot {
                room_id: room.room_id().clone(),
                room_version: room.version().clone(),
                state: room.state().clone(),
                events: room.events().to_vec(),
            })
            .collect();
        let aliases = self.aliases.read().bindings().cloned().collect();
        HomeserverSnapshot {
            server_name: self.server_name.clone(),
            rooms,
            aliases,
        }
    }

    /// Sender must be joined and clear the event type's power level
    fn check_sender(draft: &EventDraft, state: &RoomState) -> Result<(), ServiceError> {
        if state.membership(&draft.sender) != Some(room_model::Membership::Join) {
            return Err(ServiceError::Rejected(format!(
                "{} is not joined to {}",
                draft.sender, draft.room_id
            )));
        }
        let levels = state
            .power_levels()
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        if let Some(levels) = levels {
            if draft.state_key.is_some()
                && !levels.can_send_state_type(&draft.sender, &draft.event_type)
            {
                return Err(ServiceError::Rejected(format!(
                    "{} may not send {}",
                    draft.sender, draft.event_type
                )));
            }
        }
        Ok(())
    }

    /// Every alias a canonical-alias event names must resolve to its room
    fn check_canonical_alias(&self, draft: &EventDraft) -> Result<(), ServiceError> {
        let content: CanonicalAliasContent = serde_json::from_value(draft.content.clone())
            .map_err(|e| ServiceError::Rejected(format!("malformed canonical alias: {e}")))?;
        let aliases = self.aliases.read();
        for alias in content.aliases() {
            if aliases.resolve(alias) != Some(&draft.room_id) {
                return Err(ServiceError::Rejected(format!(
                    "alias {alias} does not point to {}",
                    draft.room_id
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RoomQuery for MemoryHomeserver {
    async fn room_version(&self, room_id: &RoomId) -> Result<RoomVersionId, ServiceError> {
        self.version_of(room_id)
            .ok_or_else(|| ServiceError::NotFound(format!("room {room_id}")))
    }

    async fn current_state(&self, room_id: &RoomId) -> Result<RoomState, ServiceError> {
        self.state_of(room_id)
            .ok_or_else(|| ServiceError::NotFound(format!("room {room_id}")))
    }
}

#[async_trait]
impl EventAuthority for MemoryHomeserver {
    async fn state_needed(&self, draft: &EventDraft) -> Result<StateNeeded, ServiceError> {
        Ok(state_needed(draft))
    }

    async fn build_event(
        &self,
        draft: &EventDraft,
        needed: &StateNeeded,
        now: DateTime<Utc>,
        state: &RoomState,
    ) -> Result<RoomEvent, ServiceError> {
        Self::check_sender(draft, state)?;
        if draft.event_type == event_type::CANONICAL_ALIAS {
            self.check_canonical_alias(draft)?;
        }

        let rooms = self.rooms.read();
        let room = rooms
            .get(&draft.room_id)
            .ok_or_else(|| ServiceError::NotFound(format!("room {}", draft.room_id)))?;
        let event = room
            .build(draft, needed, state, now.timestamp_millis())
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        tracing::trace!(event_id = %event.event_id, event_type = %event.event_type, "event built");
        Ok(event)
    }
}

#[async_trait]
impl EventSink for MemoryHomeserver {
    async fn commit(
        &self,
        room_id: &RoomId,
        event: RoomEvent,
        kind: EventKind,
    ) -> Result<(), ServiceError> {
        if &event.room_id != room_id {
            return Err(ServiceError::Rejected(format!(
                "event {} belongs to {}, not {room_id}",
                event.event_id, event.room_id
            )));
        }
        let mut rooms = self.rooms.write();
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ServiceError::NotFound(format!("room {room_id}")))?;
        tracing::debug!(%room_id, event_id = %event.event_id, ?kind, "event committed");
        room.append(event);
        Ok(())
    }
}

#[async_trait]
impl RoomCreator for MemoryHomeserver {
    async fn create_room(
        &self,
        request: &CreateRoomRequest,
        requester: &UserId,
    ) -> Result<CreatedRoom, CreateRoomError> {
        if request.room_version.event_format().is_err() {
            return Err(CreateRoomError::bad_request(
                "M_UNSUPPORTED_ROOM_VERSION",
                format!("Unsupported room version: {}", request.room_version),
            ));
        }
        let drafts = creation_drafts(request, requester)?;

        let mut rooms = self.rooms.write();
        if rooms.contains_key(&request.room_id) {
            return Err(CreateRoomError::bad_request(
                "M_ROOM_IN_USE",
                "Room ID already exists",
            ));
        }

        let mut room = MemoryRoom::new(request.room_id.clone(), request.room_version.clone());
        let now = Utc::now().timestamp_millis();
        for draft in &drafts {
            let needed = state_needed(draft);
            let event = room
                .build(draft, &needed, room.state(), now)
                .map_err(|e| CreateRoomError::internal(e.to_string()))?;
            room.append(event);
        }
        rooms.insert(request.room_id.clone(), room);

        tracing::debug!(room_id = %request.room_id, events = drafts.len(), "room created");
        Ok(CreatedRoom {
            room_id: request.room_id.clone(),
        })
    }
}

#[async_trait]
impl AliasDirectory for MemoryHomeserver {
    async fn list_aliases(&self, room_id: &RoomId) -> Result<Vec<RoomAliasId>, ServiceError> {
        Ok(self.aliases_of(room_id))
    }

    async fn remove_alias(
        &self,
        alias: &RoomAliasId,
        requester: &UserId,
        purge: bool,
    ) -> Result<(), ServiceError> {
        self.aliases.write().unbind(alias, requester, purge).map(drop)
    }

    async fn set_alias(
        &self,
        alias: &RoomAliasId,
        room_id: &RoomId,
        requester: &UserId,
    ) -> Result<(), ServiceError> {
        self.bind_alias(alias.clone(), room_id.clone(), requester.clone())
    }
}
