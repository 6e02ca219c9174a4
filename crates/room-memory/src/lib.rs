//! Room Memory - in-memory homeserver
//!
//! A self-contained implementation of every collaborator the upgrade
//! orchestrator consumes, backed by `parking_lot` locks. Used by the CLI
//! and by integration tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use room_memory::{HomeserverSnapshot, MemoryHomeserver};
//! use room_upgrade::{RoomUpgrader, UpgradeConfig, UpgradeServices};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hs = Arc::new(MemoryHomeserver::from_snapshot(HomeserverSnapshot::load("hs.json")?)?);
//! let upgrader = RoomUpgrader::new(UpgradeConfig::new(), UpgradeServices::from_backend(hs.clone()));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod creator;
pub mod directory;
pub mod event_id;
pub mod homeserver;
pub mod room;
pub mod snapshot;

// Re-exports for convenience
pub use directory::{AliasBinding, AliasTable};
pub use event_id::EventIdError;
pub use homeserver::MemoryHomeserver;
pub use room::MemoryRoom;
pub use snapshot::{HomeserverSnapshot, RoomSnapshot, SnapshotError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
