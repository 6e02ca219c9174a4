//! Best-effort alias migration
//!
//! Each alias is moved on its own: unbind from the predecessor, bind to the
//! successor. A failure on one alias is recorded and the next alias is
//! tried. If binding to the successor fails after the predecessor binding
//! was removed, the alias is bound back to the predecessor so it never
//! ends up resolving nowhere.

use crate::services::{ServiceError, UpgradeServices};
use room_model::{RoomAliasId, RoomId, UserId};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use tracing::Span;

/// Half of an alias move that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    /// Unbinding from the predecessor
    Remove,
    /// Binding to the successor
    Set,
}

impl Display for MigrationPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remove => f.write_str("remove"),
            Self::Set => f.write_str("set"),
        }
    }
}

/// One alias that did not move
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasFailure {
    /// Alias concerned
    pub alias: RoomAliasId,
    /// Phase that failed
    pub phase: MigrationPhase,
    /// Collaborator error
    pub reason: String,
    /// Whether the alias still resolves to the predecessor
    pub restored: bool,
}

/// Outcome of migrating every alias
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AliasMigrationReport {
    /// Aliases now bound to the successor
    pub migrated: Vec<RoomAliasId>,
    /// Aliases that stayed behind
    pub failed: Vec<AliasFailure>,
    /// Set when the predecessor's aliases could not be listed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
}

impl AliasMigrationReport {
    /// Whether every alias moved and the listing succeeded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.listing_error.is_none()
    }

    /// Whether `alias` was moved to the successor
    #[must_use]
    pub fn was_migrated(&self, alias: &RoomAliasId) -> bool {
        self.migrated.contains(alias)
    }
}

/// Aliases to move and where
#[derive(Debug, Clone, Copy)]
pub struct AliasMove<'a> {
    /// Room losing its aliases
    pub from: &'a RoomId,
    /// Room gaining them
    pub to: &'a RoomId,
    /// Identity performing the move
    pub requester: &'a UserId,
    /// Force removal regardless of alias creator
    pub purge: bool,
}

/// Move every alias bound to `mv.from` onto `mv.to`
///
/// Never fails; per-alias and listing failures end up in the report.
pub async fn migrate_aliases(
    services: &UpgradeServices,
    mv: AliasMove<'_>,
    span: &Span,
) -> AliasMigrationReport {
    let mut report = AliasMigrationReport::default();

    let aliases = match services.aliases.list_aliases(mv.from).await {
        Ok(aliases) => aliases,
        Err(e) => {
            tracing::warn!(parent: span, room_id = %mv.from, error = %e, "listing aliases failed");
            report.listing_error = Some(e.to_string());
            return report;
        }
    };

    for alias in aliases {
        match migrate_one(services, &alias, mv, span).await {
            Ok(()) => {
                tracing::debug!(parent: span, %alias, "alias migrated");
                report.migrated.push(alias);
            }
            Err(failure) => {
                tracing::warn!(
                    parent: span,
                    alias = %failure.alias,
                    phase = %failure.phase,
                    restored = failure.restored,
                    reason = %failure.reason,
                    "alias migration failed"
                );
                report.failed.push(failure);
            }
        }
    }

    report
}

async fn migrate_one(
    services: &UpgradeServices,
    alias: &RoomAliasId,
    mv: AliasMove<'_>,
    span: &Span,
) -> Result<(), AliasFailure> {
    let fail = |phase, e: ServiceError, restored| AliasFailure {
        alias: alias.clone(),
        phase,
        reason: e.to_string(),
        restored,
    };

    services
        .aliases
        .remove_alias(alias, mv.requester, mv.purge)
        .await
        .map_err(|e| fail(MigrationPhase::Remove, e, true))?;

    if let Err(e) = services.aliases.set_alias(alias, mv.to, mv.requester).await {
        let restored = match services.aliases.set_alias(alias, mv.from, mv.requester).await {
            Ok(()) => true,
            Err(restore) => {
                tracing::error!(
                    parent: span,
                    %alias,
                    error = %restore,
                    "alias could not be bound back to predecessor"
                );
                false
            }
        };
        return Err(fail(MigrationPhase::Set, e, restored));
    }

    Ok(())
}
