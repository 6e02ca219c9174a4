//! Room Model
//!
//! Domain types shared by the upgrade orchestrator and its collaborators.
//!
//! # Core Concepts
//!
//! - [`RoomId`], [`EventId`], [`UserId`], [`RoomAliasId`]: sigil-prefixed identifiers
//! - [`RoomVersionId`]: protocol version with a known [`EventFormat`]
//! - [`StateEvent`] / [`RoomState`]: current state keyed by `(type, state key)`
//! - [`PowerLevels`]: per-user privilege and state thresholds
//! - [`state_needed`]: auth-event selection for new events
//!
//! # Example
//!
//! ```rust
//! use room_model::{RoomId, ServerName, RoomVersionId};
//!
//! let server: ServerName = "example.org".parse().unwrap();
//! let successor = RoomId::random(&server, 16);
//! assert_eq!(successor.server_name(), "example.org");
//! assert!(RoomVersionId::from("10").is_known());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod auth;
pub mod content;
pub mod event;
mod id;
mod power_levels;
mod state;
mod version;

// Re-exports
pub use auth::{state_needed, StateNeeded};
pub use content::{
    CanonicalAliasContent, ContentError, CreateContent, GuestAccess, HistoryVisibility,
    HistoryVisibilityContent, JoinRule, JoinRulesContent, MemberContent, Membership, NameContent,
    PreviousRoom, TombstoneContent, TopicContent,
};
pub use event::{event_type, EventDraft, RoomEvent, StateEvent, StateTuple};
pub use id::{EventId, IdError, RoomAliasId, RoomId, ServerName, UserId};
pub use power_levels::{PowerLevels, CREATOR_LEVEL};
pub use state::RoomState;
pub use version::{EventFormat, RoomVersionId, UnsupportedRoomVersion, KNOWN_ROOM_VERSIONS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
