//! Room Upgrade - replacement room orchestrator
//!
//! Upgrades a room to a new protocol version:
//! - Commits a tombstone in the predecessor naming a fresh successor
//! - Creates the successor from a curated snapshot of predecessor state
//! - Moves aliases across, best-effort
//! - Re-emits the canonical alias in the successor
//!
//! All storage lives behind the collaborator traits in [`services`].
//!
//! # Example
//!
//! ```rust,ignore
//! use room_upgrade::{RoomUpgrader, UpgradeConfig, UpgradeServices};
//!
//! # async fn example(services: UpgradeServices) -> Result<(), Box<dyn std::error::Error>> {
//! let upgrader = RoomUpgrader::new(UpgradeConfig::new(), services);
//!
//! let outcome = upgrader
//!     .upgrade(&"!old:example.org".parse()?, &"@admin:example.org".parse()?, &"10".into())
//!     .await?;
//!
//! println!("replaced by {}", outcome.replacement_room);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod aliases;
pub mod api;
pub mod authz;
pub mod canonical;
pub mod config;
pub mod create;
pub mod error;
pub mod send;
pub mod services;
pub mod snapshot;
pub mod stage;
pub mod tombstone;
pub mod upgrader;
pub mod version;

// Re-exports for convenience
pub use aliases::{AliasFailure, AliasMigrationReport, MigrationPhase};
pub use api::{handle_upgrade, ClientResponse, ErrorBody, UpgradeRoomRequest, UpgradeRoomResponse};
pub use config::{ConfigError, UpgradeConfig};
pub use create::{CreateRoomError, CreateRoomRequest, CreatedRoom, InitialStateEvent};
pub use error::{InputError, InternalError, UpgradeError, INTERNAL_MESSAGE};
pub use services::{
    AliasDirectory, EventAuthority, EventKind, EventSink, RoomCreator, RoomQuery, ServiceError,
    UpgradeServices,
};
pub use snapshot::{StateSnapshot, EXTRACTION_RULES};
pub use stage::{StageError, StageTrace, TerminalState, UpgradeStage};
pub use upgrader::{RoomUpgrader, UpgradeContext, UpgradeOutcome};
pub use version::VersionValidator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving upgrades
    pub use crate::{
        handle_upgrade, ClientResponse, RoomUpgrader, UpgradeConfig, UpgradeError,
        UpgradeOutcome, UpgradeServices, UpgradeStage,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
