//! Fault injection and call recording
//!
//! [`FaultyBackend`] wraps any backend implementing the collaborator
//! traits, records every call in order and fails the ones matching an
//! injected [`Fault`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use room_model::{
    EventDraft, RoomAliasId, RoomEvent, RoomId, RoomState, RoomVersionId, StateNeeded, UserId,
};
use room_upgrade::{
    AliasDirectory, CreateRoomError, CreateRoomRequest, CreatedRoom, EventAuthority, EventKind,
    EventSink, RoomCreator, RoomQuery, ServiceError,
};
use std::sync::Arc;

/// A recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RoomVersion(RoomId),
    CurrentState(RoomId),
    StateNeeded { event_type: String },
    BuildEvent { event_type: String },
    Commit { room_id: RoomId, event_type: String },
    CreateRoom(RoomId),
    ListAliases(RoomId),
    RemoveAlias(RoomAliasId),
    SetAlias { alias: RoomAliasId, room_id: RoomId },
}

impl Call {
    /// Whether the call writes anything
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Commit { .. } | Self::CreateRoom(_) | Self::RemoveAlias(_) | Self::SetAlias { .. }
        )
    }
}

/// Failure to inject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Current state of this room cannot be read
    CurrentState(RoomId),
    /// Dependency resolution for this event type returns nothing
    NoDependencies { event_type: String },
    /// Building this event type fails
    BuildEvent { event_type: String },
    /// Committing this event type fails
    Commit { event_type: String },
    /// Room creation fails with this error
    CreateRoom(CreateRoomError),
    /// Listing aliases fails
    ListAliases,
    /// Removing this alias fails
    RemoveAlias(RoomAliasId),
    /// Binding this alias to this room fails; `None` matches any room
    SetAlias {
        alias: RoomAliasId,
        room_id: Option<RoomId>,
    },
    /// Binding this alias to any room other than `home` fails
    MoveAlias { alias: RoomAliasId, home: RoomId },
}

fn injected(what: &str) -> ServiceError {
    ServiceError::Unavailable(format!("injected fault: {what}"))
}

/// Recording, fault-injecting wrapper
#[derive(Debug)]
pub struct FaultyBackend<B> {
    inner: Arc<B>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<Call>>,
}

impl<B> FaultyBackend<B> {
    pub fn new(inner: Arc<B>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Builder-style [`inject`](Self::inject)
    pub fn with_fault(self, fault: Fault) -> Self {
        self.inject(fault);
        self
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    pub fn inner(&self) -> &Arc<B> {
        &self.inner
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Writing calls so far, in order
    pub fn mutations(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn has(&self, pred: impl Fn(&Fault) -> bool) -> bool {
        self.faults.lock().iter().any(pred)
    }
}

#[async_trait]
impl<B: RoomQuery> RoomQuery for FaultyBackend<B> {
    async fn room_version(&self, room_id: &RoomId) -> Result<RoomVersionId, ServiceError> {
        self.record(Call::RoomVersion(room_id.clone()));
        self.inner.room_version(room_id).await
    }

    async fn current_state(&self, room_id: &RoomId) -> Result<RoomState, ServiceError> {
        self.record(Call::CurrentState(room_id.clone()));
        if self.has(|f| matches!(f, Fault::CurrentState(r) if r == room_id)) {
            return Err(injected("current_state"));
        }
        self.inner.current_state(room_id).await
    }
}

#[async_trait]
impl<B: EventAuthority> EventAuthority for FaultyBackend<B> {
    async fn state_needed(&self, draft: &EventDraft) -> Result<StateNeeded, ServiceError> {
        self.record(Call::StateNeeded {
            event_type: draft.event_type.clone(),
        });
        if self.has(|f| matches!(f, Fault::NoDependencies { event_type } if *event_type == draft.event_type)) {
            return Ok(StateNeeded::default());
        }
        self.inner.state_needed(draft).await
    }

    async fn build_event(
        &self,
        draft: &EventDraft,
        needed: &StateNeeded,
        now: DateTime<Utc>,
        state: &RoomState,
    ) -> Result<RoomEvent, ServiceError> {
        self.record(Call::BuildEvent {
            event_type: draft.event_type.clone(),
        });
        if self.has(|f| matches!(f, Fault::BuildEvent { event_type } if *event_type == draft.event_type)) {
            return Err(injected("build_event"));
        }
        self.inner.build_event(draft, needed, now, state).await
    }
}

#[async_trait]
impl<B: EventSink> EventSink for FaultyBackend<B> {
    async fn commit(
        &self,
        room_id: &RoomId,
        event: RoomEvent,
        kind: EventKind,
    ) -> Result<(), ServiceError> {
        self.record(Call::Commit {
            room_id: room_id.clone(),
            event_type: event.event_type.clone(),
        });
        if self.has(|f| matches!(f, Fault::Commit { event_type } if *event_type == event.event_type)) {
            return Err(injected("commit"));
        }
        self.inner.commit(room_id, event, kind).await
    }
}

#[async_trait]
impl<B: RoomCreator> RoomCreator for FaultyBackend<B> {
    async fn create_room(
        &self,
        request: &CreateRoomRequest,
        requester: &UserId,
    ) -> Result<CreatedRoom, CreateRoomError> {
        self.record(Call::CreateRoom(request.room_id.clone()));
        let fault = self.faults.lock().iter().find_map(|f| match f {
            Fault::CreateRoom(e) => Some(e.clone()),
            _ => None,
        });
        if let Some(e) = fault {
            return Err(e);
        }
        self.inner.create_room(request, requester).await
    }
}

#[async_trait]
impl<B: AliasDirectory> AliasDirectory for FaultyBackend<B> {
    async fn list_aliases(&self, room_id: &RoomId) -> Result<Vec<RoomAliasId>, ServiceError> {
        self.record(Call::ListAliases(room_id.clone()));
        if self.has(|f| matches!(f, Fault::ListAliases)) {
            return Err(injected("list_aliases"));
        }
        self.inner.list_aliases(room_id).await
    }

    async fn remove_alias(
        &self,
        alias: &RoomAliasId,
        requester: &UserId,
        purge: bool,
    ) -> Result<(), ServiceError> {
        self.record(Call::RemoveAlias(alias.clone()));
        if self.has(|f| matches!(f, Fault::RemoveAlias(a) if a == alias)) {
            return Err(injected("remove_alias"));
        }
        self.inner.remove_alias(alias, requester, purge).await
    }

    async fn set_alias(
        &self,
        alias: &RoomAliasId,
        room_id: &RoomId,
        requester: &UserId,
    ) -> Result<(), ServiceError> {
        self.record(Call::SetAlias {
            alias: alias.clone(),
            room_id: room_id.clone(),
        });
        let blocked = self.has(|f| match f {
            Fault::SetAlias { alias: a, room_id: r } => {
                a == alias && r.as_ref().map_or(true, |r| r == room_id)
            }
            Fault::MoveAlias { alias: a, home } => a == alias && home != room_id,
            _ => false,
        });
        if blocked {
            return Err(injected("set_alias"));
        }
        self.inner.set_alias(alias, room_id, requester).await
    }
}
