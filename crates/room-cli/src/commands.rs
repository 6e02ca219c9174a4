//! Subcommand bodies
//!
//! Each returns its stdout payload; the binary decides the exit code.

use anyhow::{Context, Result};
use room_memory::{HomeserverSnapshot, MemoryHomeserver};
use room_model::{RoomId, UserId};
use room_upgrade::{handle_upgrade, ClientResponse, RoomUpgrader, UpgradeConfig, UpgradeServices};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments of `roomup upgrade`
#[derive(Debug, Clone)]
pub struct UpgradeArgs {
    pub snapshot: PathBuf,
    pub room: String,
    pub user: String,
    pub version: String,
    pub config: Option<PathBuf>,
    pub dump: Option<PathBuf>,
}

/// Configuration from `path`, or defaults on `fallback_server`
///
/// # Errors
/// Returns an error if the file cannot be read or fails validation.
pub fn load_config(path: Option<&Path>, fallback_server: Option<&str>) -> Result<UpgradeConfig> {
    if let Some(path) = path {
        return UpgradeConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()));
    }

    let config = match fallback_server {
        Some(server) => UpgradeConfig::new().with_server_name(
            server
                .parse()
                .with_context(|| format!("invalid server name {server:?}"))?,
        ),
        None => UpgradeConfig::new(),
    };
    config.validate().context("validating configuration")?;
    Ok(config)
}

/// Run one upgrade against a snapshot file
///
/// Without `--config` successors are minted on the snapshot's server.
///
/// # Errors
/// Returns an error for unreadable inputs. A rejected upgrade is not an
/// error; it comes back as a non-2xx [`ClientResponse`].
pub async fn upgrade(args: &UpgradeArgs) -> Result<ClientResponse> {
    let room: RoomId = args
        .room
        .parse()
        .with_context(|| format!("invalid room id {:?}", args.room))?;
    let user: UserId = args
        .user
        .parse()
        .with_context(|| format!("invalid user id {:?}", args.user))?;

    let snapshot = HomeserverSnapshot::load(&args.snapshot)
        .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
    let server = snapshot.server_name.to_string();
    let config = load_config(args.config.as_deref(), Some(&server))?;

    let hs = Arc::new(MemoryHomeserver::from_snapshot(snapshot).context("loading homeserver")?);
    let upgrader = RoomUpgrader::new(config, UpgradeServices::from_backend(hs.clone()));

    let body = serde_json::to_vec(&serde_json::json!({ "new_version": args.version }))?;
    let response = handle_upgrade(&upgrader, &room, &user, &body).await;

    if let Some(dump) = &args.dump {
        hs.snapshot()
            .save(dump)
            .with_context(|| format!("writing snapshot {}", dump.display()))?;
        tracing::info!(path = %dump.display(), "homeserver state written");
    }

    Ok(response)
}

/// Output of `roomup versions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionList {
    pub default: String,
    pub accepted: Vec<String>,
}

/// Versions an upgrade may target under `config`
#[must_use]
pub fn versions(config: &UpgradeConfig) -> VersionList {
    let validator = room_upgrade::VersionValidator::new(config);
    VersionList {
        default: config.default_room_version.to_string(),
        accepted: validator.accepted().map(ToString::to_string).collect(),
    }
}
