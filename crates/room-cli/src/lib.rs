//! roomup - command-line front end for room upgrades
//!
//! Loads a homeserver snapshot into memory, runs one upgrade through the
//! same request path a client would hit and prints the response.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod telemetry;

pub use commands::{UpgradeArgs, VersionList};
pub use telemetry::LogFormat;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
