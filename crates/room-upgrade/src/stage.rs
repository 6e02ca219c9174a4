//! Upgrade stage state machine
//!
//! Stages advance strictly forward:
//!
//! ```text
//! Requested → Validated → Authorized → Snapshotted → Tombstoned → Created
//!           → AliasesMigrated → [CanonicalRepublished] → Done
//! ```
//!
//! `CanonicalRepublished` is skipped when the predecessor had no canonical
//! alias. There are no back-edges; failures end in a [`TerminalState`].

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Progress of one upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStage {
    /// Request accepted for processing
    Requested,
    /// Target version is supported
    Validated,
    /// Requester may mutate predecessor state
    Authorized,
    /// Curated state extracted
    Snapshotted,
    /// Tombstone committed in the predecessor
    Tombstoned,
    /// Successor room exists
    Created,
    /// Alias migration finished (possibly with per-alias failures)
    AliasesMigrated,
    /// Canonical alias re-emitted in the successor
    CanonicalRepublished,
    /// Response assembled
    Done,
}

impl UpgradeStage {
    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Validated => "validated",
            Self::Authorized => "authorized",
            Self::Snapshotted => "snapshotted",
            Self::Tombstoned => "tombstoned",
            Self::Created => "created",
            Self::AliasesMigrated => "aliases_migrated",
            Self::CanonicalRepublished => "canonical_republished",
            Self::Done => "done",
        }
    }
}

impl Display for UpgradeStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of an upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// Malformed request or unsupported version
    RejectedVersion,
    /// Requester lacks privilege
    Forbidden,
    /// Predecessor room unknown
    NotFound,
    /// Anything failing up to and including the tombstone commit
    BuildFailed,
    /// Room Creator refused or failed
    CreateFailed,
    /// Canonical alias could not be re-emitted
    RepublishFailed,
}

impl TerminalState {
    /// Whether the predecessor is guaranteed unmodified
    #[inline]
    #[must_use]
    pub fn predecessor_untouched(self) -> bool {
        matches!(
            self,
            Self::RejectedVersion | Self::Forbidden | Self::NotFound | Self::BuildFailed
        )
    }
}

/// State machine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// Transition not in the allowed set
    #[error("illegal stage transition: {from} -> {to}")]
    IllegalTransition {
        /// Current stage
        from: UpgradeStage,
        /// Requested stage
        to: UpgradeStage,
    },
}

/// Stages reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: UpgradeStage) -> Vec<UpgradeStage> {
    use UpgradeStage::*;
    match from {
        Requested => vec![Validated],
        Validated => vec![Authorized],
        Authorized => vec![Snapshotted],
        Snapshotted => vec![Tombstoned],
        Tombstoned => vec![Created],
        Created => vec![AliasesMigrated],
        AliasesMigrated => vec![CanonicalRepublished, Done],
        CanonicalRepublished => vec![Done],
        Done => vec![],
    }
}

/// Validate a single transition
///
/// # Errors
/// Returns [`StageError::IllegalTransition`] if `to` is not reachable from
/// `from` in one step.
pub fn validate_transition(from: UpgradeStage, to: UpgradeStage) -> Result<(), StageError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StageError::IllegalTransition { from, to })
    }
}

/// Ordered record of the stages an upgrade has passed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTrace {
    stages: Vec<UpgradeStage>,
}

impl StageTrace {
    /// Start at [`UpgradeStage::Requested`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: vec![UpgradeStage::Requested],
        }
    }

    /// Current stage
    #[inline]
    #[must_use]
    pub fn current(&self) -> UpgradeStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(UpgradeStage::Requested)
    }

    /// Advance to `to`
    ///
    /// # Errors
    /// Returns [`StageError`] on an illegal transition; the trace is unchanged.
    pub fn advance(&mut self, to: UpgradeStage) -> Result<(), StageError> {
        validate_transition(self.current(), to)?;
        self.stages.push(to);
        Ok(())
    }

    /// Whether `stage` has been reached
    #[inline]
    #[must_use]
    pub fn reached(&self, stage: UpgradeStage) -> bool {
        self.stages.contains(&stage)
    }

    /// All stages in order
    #[inline]
    #[must_use]
    pub fn stages(&self) -> &[UpgradeStage] {
        &self.stages
    }
}

impl Default for StageTrace {
    fn default() -> Self {
        Self::new()
    }
}
