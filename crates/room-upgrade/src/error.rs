//! Error types for room upgrades
//!
//! Every failure maps to:
//! - a [`TerminalState`] of the stage machine
//! - an HTTP status and protocol `errcode`
//! - a client message that never leaks collaborator internals

use crate::create::CreateRoomError;
use crate::services::ServiceError;
use crate::stage::{StageError, TerminalState, UpgradeStage};
use room_model::{ContentError, RoomId};

/// Main upgrade error type
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Malformed request or unsupported version
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// Predecessor room unknown
    #[error("room not found: {0}")]
    NotFound(RoomId),

    /// Requester lacks privilege
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Collaborator or precondition failure
    #[error("internal error while reaching {during}: {source}")]
    Internal {
        /// Stage that was being attempted
        during: UpgradeStage,
        /// Underlying failure
        #[source]
        source: InternalError,
    },

    /// Room Creator failure, passed through verbatim
    #[error("room creation failed: {0}")]
    CreateFailed(#[from] CreateRoomError),
}

/// Client input errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Body is not JSON
    #[error("request body is not valid JSON: {0}")]
    NotJson(String),

    /// Body is JSON of the wrong shape
    #[error("malformed request body: {0}")]
    BadJson(String),

    /// Version has no producible event format or is disabled
    #[error("Unsupported room version: {0}")]
    UnsupportedRoomVersion(String),
}

/// Server-side failures; details are logged, never sent to clients
#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    /// Current state could not be fetched
    #[error("state query failed: {0}")]
    StateQuery(#[source] ServiceError),

    /// Current state holds undecodable content the upgrade depends on
    #[error("malformed room state: {0}")]
    MalformedState(#[from] ContentError),

    /// Auth dependencies could not be computed
    #[error("resolving dependencies of {event_type} failed: {source}")]
    DependencyResolution {
        /// Event type being drafted
        event_type: String,
        /// Collaborator error
        #[source]
        source: ServiceError,
    },

    /// Dependency set came back empty
    #[error("no auth dependencies for {event_type}")]
    NoDependencies {
        /// Event type being drafted
        event_type: String,
    },

    /// Event could not be built
    #[error("building {event_type} failed: {source}")]
    Build {
        /// Event type being drafted
        event_type: String,
        /// Collaborator error
        #[source]
        source: ServiceError,
    },

    /// Event could not be committed
    #[error("committing {event_type} failed: {source}")]
    Commit {
        /// Event type being committed
        event_type: String,
        /// Collaborator error
        #[source]
        source: ServiceError,
    },

    /// Room Creator reported a room other than the one requested
    #[error("room creator returned {actual}, expected {expected}")]
    SuccessorMismatch {
        /// Pre-allocated successor id
        expected: RoomId,
        /// Id the creator reported
        actual: RoomId,
    },

    /// Orchestrator attempted an illegal stage transition
    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Generic message for every internal failure
pub const INTERNAL_MESSAGE: &str = "Internal server error";

impl UpgradeError {
    /// Wrap an internal failure with the stage being attempted
    #[inline]
    #[must_use]
    pub fn internal(during: UpgradeStage, source: impl Into<InternalError>) -> Self {
        Self::Internal {
            during,
            source: source.into(),
        }
    }

    /// HTTP status for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Internal { .. } => 500,
            Self::CreateFailed(e) => e.status,
        }
    }

    /// Protocol error code
    #[must_use]
    pub fn errcode(&self) -> &str {
        match self {
            Self::InvalidInput(InputError::NotJson(_)) => "M_NOT_JSON",
            Self::InvalidInput(InputError::BadJson(_)) => "M_BAD_JSON",
            Self::InvalidInput(InputError::UnsupportedRoomVersion(_)) => {
                "M_UNSUPPORTED_ROOM_VERSION"
            }
            Self::Forbidden(_) => "M_FORBIDDEN",
            Self::NotFound(_) => "M_NOT_FOUND",
            Self::Internal { .. } => "M_UNKNOWN",
            Self::CreateFailed(e) => &e.errcode,
        }
    }

    /// Message safe to show the client
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidInput(e) => e.to_string(),
            Self::Forbidden(reason) => reason.clone(),
            Self::NotFound(_) => "Unable to query room".to_string(),
            Self::Internal { .. } => INTERNAL_MESSAGE.to_string(),
            Self::CreateFailed(e) => e.error.clone(),
        }
    }

    /// Terminal state of the stage machine
    #[must_use]
    pub fn terminal_state(&self) -> TerminalState {
        match self {
            Self::InvalidInput(_) => TerminalState::RejectedVersion,
            Self::Forbidden(_) => TerminalState::Forbidden,
            Self::NotFound(_) => TerminalState::NotFound,
            Self::CreateFailed(_) => TerminalState::CreateFailed,
            Self::Internal { during, .. } if *during >= UpgradeStage::AliasesMigrated => {
                TerminalState::RepublishFailed
            }
            Self::Internal { during, .. } if *during > UpgradeStage::Tombstoned => {
                TerminalState::CreateFailed
            }
            Self::Internal { .. } => TerminalState::BuildFailed,
        }
    }

    /// Whether the predecessor is guaranteed unmodified
    #[inline]
    #[must_use]
    pub fn predecessor_untouched(&self) -> bool {
        self.terminal_state().predecessor_untouched()
    }

    /// Whether the client caused this error
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal(during: UpgradeStage) -> UpgradeError {
        UpgradeError::internal(
            during,
            InternalError::StateQuery(ServiceError::Unavailable("db down at 10.0.0.3".into())),
        )
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            UpgradeError::from(InputError::UnsupportedRoomVersion("99".into())).status_code(),
            400
        );
        assert_eq!(UpgradeError::Forbidden("no".into()).status_code(), 403);
        assert_eq!(
            UpgradeError::NotFound("!r:x".parse().unwrap()).status_code(),
            404
        );
        assert_eq!(internal(UpgradeStage::Authorized).status_code(), 500);
    }

    #[test]
    fn create_failure_passes_through() {
        let err = UpgradeError::from(CreateRoomError {
            status: 409,
            errcode: "M_ROOM_IN_USE".into(),
            error: "Room ID already exists".into(),
        });
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.errcode(), "M_ROOM_IN_USE");
        assert_eq!(err.client_message(), "Room ID already exists");
        assert_eq!(err.terminal_state(), TerminalState::CreateFailed);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = internal(UpgradeStage::Authorized);
        assert_eq!(err.client_message(), INTERNAL_MESSAGE);
        assert!(err.to_string().contains("db down"));
        assert_eq!(err.errcode(), "M_UNKNOWN");
    }

    #[test]
    fn terminal_state_follows_stage() {
        assert_eq!(
            internal(UpgradeStage::Tombstoned).terminal_state(),
            TerminalState::BuildFailed
        );
        assert!(internal(UpgradeStage::Tombstoned).predecessor_untouched());
        assert_eq!(
            internal(UpgradeStage::CanonicalRepublished).terminal_state(),
            TerminalState::RepublishFailed
        );
        assert!(!internal(UpgradeStage::CanonicalRepublished).predecessor_untouched());
    }

    #[test]
    fn unsupported_version_message() {
        let err = UpgradeError::from(InputError::UnsupportedRoomVersion("42".into()));
        assert_eq!(err.errcode(), "M_UNSUPPORTED_ROOM_VERSION");
        assert_eq!(err.client_message(), "Unsupported room version: 42");
        assert_eq!(err.terminal_state(), TerminalState::RejectedVersion);
    }
}
