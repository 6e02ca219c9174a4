//! Collaborator interfaces
//!
//! The orchestrator owns no storage. Every read and write goes through one
//! of these traits:
//! - [`RoomQuery`]: room version and current state
//! - [`EventAuthority`]: auth-dependency resolution and event building
//! - [`EventSink`]: committing built events
//! - [`RoomCreator`]: instantiating the successor
//! - [`AliasDirectory`]: alias bindings

use crate::create::{CreateRoomError, CreateRoomRequest, CreatedRoom};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use room_model::{
    EventDraft, RoomAliasId, RoomEvent, RoomId, RoomState, RoomVersionId, StateNeeded, UserId,
};
use std::fmt;
use std::sync::Arc;

/// Collaborator failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Target does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Request refused (authorization, validation)
    #[error("rejected: {0}")]
    Rejected(String),

    /// Target already exists or is bound elsewhere
    #[error("conflict: {0}")]
    Conflict(String),

    /// Collaborator could not serve the request
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// How a committed event entered the room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Freshly created on this server
    New,
}

/// Room version and current-state lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomQuery: Send + Sync {
    /// Protocol version of `room_id`, or [`ServiceError::NotFound`]
    async fn room_version(&self, room_id: &RoomId) -> Result<RoomVersionId, ServiceError>;

    /// Current state of `room_id`
    async fn current_state(&self, room_id: &RoomId) -> Result<RoomState, ServiceError>;
}

/// Dependency resolution and event building
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventAuthority: Send + Sync {
    /// State slots `draft` must cite as auth events
    async fn state_needed(&self, draft: &EventDraft) -> Result<StateNeeded, ServiceError>;

    /// Finalize `draft` against `state` at time `now`
    async fn build_event(
        &self,
        draft: &EventDraft,
        needed: &StateNeeded,
        now: DateTime<Utc>,
        state: &RoomState,
    ) -> Result<RoomEvent, ServiceError>;
}

/// Event commit
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Commit a built event into `room_id`
    async fn commit(
        &self,
        room_id: &RoomId,
        event: RoomEvent,
        kind: EventKind,
    ) -> Result<(), ServiceError>;
}

/// Successor room instantiation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomCreator: Send + Sync {
    /// Create the room described by `request` on behalf of `requester`
    async fn create_room(
        &self,
        request: &CreateRoomRequest,
        requester: &UserId,
    ) -> Result<CreatedRoom, CreateRoomError>;
}

/// Alias bindings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AliasDirectory: Send + Sync {
    /// Aliases currently bound to `room_id`
    async fn list_aliases(&self, room_id: &RoomId) -> Result<Vec<RoomAliasId>, ServiceError>;

    /// Unbind `alias`; `purge` forces removal regardless of who created it
    async fn remove_alias(
        &self,
        alias: &RoomAliasId,
        requester: &UserId,
        purge: bool,
    ) -> Result<(), ServiceError>;

    /// Bind `alias` to `room_id`
    async fn set_alias(
        &self,
        alias: &RoomAliasId,
        room_id: &RoomId,
        requester: &UserId,
    ) -> Result<(), ServiceError>;
}

/// Every collaborator one upgrade talks to
#[derive(Clone)]
pub struct UpgradeServices {
    /// Room/state lookups
    pub rooms: Arc<dyn RoomQuery>,
    /// Dependency resolution and building
    pub events: Arc<dyn EventAuthority>,
    /// Event commit
    pub sink: Arc<dyn EventSink>,
    /// Room creation
    pub creator: Arc<dyn RoomCreator>,
    /// Alias directory
    pub aliases: Arc<dyn AliasDirectory>,
}

impl UpgradeServices {
    /// Use one backend for every collaborator
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: RoomQuery + EventAuthority + EventSink + RoomCreator + AliasDirectory + 'static,
    {
        Self {
            rooms: backend.clone(),
            events: backend.clone(),
            sink: backend.clone(),
            creator: backend.clone(),
            aliases: backend,
        }
    }
}

impl fmt::Debug for UpgradeServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeServices").finish_non_exhaustive()
    }
}
