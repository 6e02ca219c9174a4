//! Testing utilities for the roomup workspace
//!
//! Shared fixtures, a fault-injecting backend wrapper and a harness that
//! wires both to an upgrader.

#![allow(missing_docs)]

pub mod faults;
pub mod fixtures;

pub use faults::{Call, Fault, FaultyBackend};
pub use fixtures::{alias, config, example_room, homeserver, room_id, server, user, RoomFixture};

use room_memory::MemoryHomeserver;
use room_upgrade::{RoomUpgrader, UpgradeConfig, UpgradeServices};
use std::sync::Arc;

/// Homeserver, recording wrapper and upgrader over them
pub struct Harness {
    pub hs: Arc<MemoryHomeserver>,
    pub backend: Arc<FaultyBackend<MemoryHomeserver>>,
    pub upgrader: RoomUpgrader,
}

impl Harness {
    /// Harness over `hs` with the fixture configuration
    pub fn new(hs: MemoryHomeserver) -> Self {
        Self::with_config(hs, config())
    }

    pub fn with_config(hs: MemoryHomeserver, config: UpgradeConfig) -> Self {
        let hs = Arc::new(hs);
        let backend = Arc::new(FaultyBackend::new(hs.clone()));
        let upgrader = RoomUpgrader::new(config, UpgradeServices::from_backend(backend.clone()));
        Self {
            hs,
            backend,
            upgrader,
        }
    }

    /// Harness with [`example_room`] installed
    pub fn example() -> Self {
        let hs = homeserver();
        example_room().install(&hs).unwrap();
        Self::new(hs)
    }
}
