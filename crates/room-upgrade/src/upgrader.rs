//! Room upgrade orchestrator
//!
//! Drives one upgrade through every stage:
//! - Validates the target version
//! - Fetches the predecessor's version and current state
//! - Authorizes the requester
//! - Extracts the curated snapshot
//! - Commits the tombstone, then creates the successor
//! - Migrates aliases and republishes the canonical alias
//!
//! Stages run strictly in sequence. Nothing after the tombstone commit is
//! rolled back on failure.

use crate::aliases::{migrate_aliases, AliasMigrationReport, AliasMove};
use crate::authz::authorize;
use crate::canonical::republish_canonical_alias;
use crate::config::UpgradeConfig;
use crate::create::CreateRoomRequest;
use crate::error::{InternalError, UpgradeError};
use crate::services::{ServiceError, UpgradeServices};
use crate::snapshot::{extract, StateSnapshot};
use crate::stage::{StageTrace, UpgradeStage};
use crate::tombstone::publish_tombstone;
use crate::version::VersionValidator;
use room_model::{EventId, PreviousRoom, RoomId, RoomState, RoomVersionId, UserId};
use serde::Serialize;
use tracing::Span;

/// Result of a completed upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeOutcome {
    /// Successor room
    pub replacement_room: RoomId,
    /// Tombstone committed in the predecessor
    pub tombstone: EventId,
    /// Per-alias migration results
    pub aliases: AliasMigrationReport,
    /// Whether a canonical alias was re-emitted in the successor
    pub canonical_republished: bool,
    /// Stages passed through, in order
    pub stages: Vec<UpgradeStage>,
}

/// Workflow state threaded through every stage
#[derive(Debug)]
pub struct UpgradeContext {
    /// Identity performing the upgrade
    pub requester: UserId,
    /// Room being replaced
    pub predecessor: RoomId,
    /// Target protocol version
    pub new_version: RoomVersionId,
    /// Span every stage logs under
    pub span: Span,
    trace: StageTrace,
}

impl UpgradeContext {
    /// Start a context at [`UpgradeStage::Requested`]
    #[must_use]
    pub fn new(predecessor: RoomId, requester: UserId, new_version: RoomVersionId) -> Self {
        let span = tracing::info_span!(
            "room_upgrade",
            room_id = %predecessor,
            requester = %requester,
            new_version = %new_version,
        );
        Self {
            requester,
            predecessor,
            new_version,
            span,
            trace: StageTrace::new(),
        }
    }

    /// Current stage
    #[inline]
    #[must_use]
    pub fn stage(&self) -> UpgradeStage {
        self.trace.current()
    }

    /// Stages passed through so far
    #[inline]
    #[must_use]
    pub fn trace(&self) -> &StageTrace {
        &self.trace
    }

    fn advance(&mut self, to: UpgradeStage) -> Result<(), UpgradeError> {
        self.trace
            .advance(to)
            .map_err(|e| UpgradeError::internal(to, e))?;
        tracing::debug!(parent: &self.span, stage = %to, "stage reached");
        Ok(())
    }
}

/// Upgrade orchestrator
///
/// Holds no per-room state; concurrent upgrades of the same room are not
/// serialized and each produces its own successor.
#[derive(Debug, Clone)]
pub struct RoomUpgrader {
    config: UpgradeConfig,
    validator: VersionValidator,
    services: UpgradeServices,
}

impl RoomUpgrader {
    /// Create an upgrader over `services`
    #[must_use]
    pub fn new(config: UpgradeConfig, services: UpgradeServices) -> Self {
        Self {
            validator: VersionValidator::new(&config),
            config,
            services,
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// Version validator in use
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &VersionValidator {
        &self.validator
    }

    /// Upgrade `room_id` to `new_version` on behalf of `requester`
    ///
    /// # Errors
    /// - [`UpgradeError::InvalidInput`] for an unsupported version
    /// - [`UpgradeError::NotFound`] if the room is unknown
    /// - [`UpgradeError::Forbidden`] if the requester lacks privilege
    /// - [`UpgradeError::CreateFailed`] if the Room Creator refuses
    /// - [`UpgradeError::Internal`] for any collaborator failure
    pub async fn upgrade(
        &self,
        room_id: &RoomId,
        requester: &UserId,
        new_version: &RoomVersionId,
    ) -> Result<UpgradeOutcome, UpgradeError> {
        let mut ctx = UpgradeContext::new(room_id.clone(), requester.clone(), new_version.clone());
        tracing::info!(parent: &ctx.span, "room upgrade requested");

        match self.run(&mut ctx).await {
            Ok(outcome) => {
                tracing::info!(
                    parent: &ctx.span,
                    replacement_room = %outcome.replacement_room,
                    migrated = outcome.aliases.migrated.len(),
                    failed = outcome.aliases.failed.len(),
                    "room upgrade complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                let terminal = e.terminal_state();
                if e.is_client_error() {
                    tracing::info!(parent: &ctx.span, ?terminal, error = %e, "room upgrade refused");
                } else {
                    tracing::error!(
                        parent: &ctx.span,
                        ?terminal,
                        stage = %ctx.stage(),
                        error = %e,
                        "room upgrade failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run(&self, ctx: &mut UpgradeContext) -> Result<UpgradeOutcome, UpgradeError> {
        // 1. Version check, before any read
        self.validator.validate(&ctx.new_version)?;
        ctx.advance(UpgradeStage::Validated)?;

        // 2. Room lookup and authorization
        let state = self.load_room(ctx).await?;
        authorize(&ctx.requester, &state, &ctx.span)?;
        ctx.advance(UpgradeStage::Authorized)?;

        // 3. Curated snapshot
        let snapshot = extract(&state, &ctx.span);
        ctx.advance(UpgradeStage::Snapshotted)?;

        // 4. Tombstone naming a pre-allocated successor
        let successor = RoomId::random(
            &self.config.server_name,
            self.config.successor_localpart_len,
        );
        tracing::debug!(parent: &ctx.span, %successor, "successor id allocated");
        let tombstone = publish_tombstone(
            &self.services,
            &ctx.predecessor,
            &ctx.requester,
            &self.config.tombstone_body,
            &successor,
            &state,
            &ctx.span,
        )
        .await?;
        ctx.advance(UpgradeStage::Tombstoned)?;

        // 5. Successor creation
        self.create_successor(ctx, &successor, &snapshot, &tombstone)
            .await?;
        ctx.advance(UpgradeStage::Created)?;

        // 6. Aliases, best-effort
        let aliases = migrate_aliases(
            &self.services,
            AliasMove {
                from: &ctx.predecessor,
                to: &successor,
                requester: &ctx.requester,
                purge: self.config.purge_aliases,
            },
            &ctx.span,
        )
        .await;
        ctx.advance(UpgradeStage::AliasesMigrated)?;

        // 7. Canonical alias, once its aliases resolve to the successor
        let canonical_republished = match &snapshot.canonical_alias {
            Some(content) => {
                republish_canonical_alias(
                    &self.services,
                    &successor,
                    &ctx.requester,
                    content,
                    &ctx.span,
                )
                .await?;
                ctx.advance(UpgradeStage::CanonicalRepublished)?;
                true
            }
            None => false,
        };

        ctx.advance(UpgradeStage::Done)?;
        Ok(UpgradeOutcome {
            replacement_room: successor,
            tombstone,
            aliases,
            canonical_republished,
            stages: ctx.trace.stages().to_vec(),
        })
    }

    async fn load_room(&self, ctx: &UpgradeContext) -> Result<RoomState, UpgradeError> {
        let version = self
            .services
            .rooms
            .room_version(&ctx.predecessor)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => UpgradeError::NotFound(ctx.predecessor.clone()),
                other => {
                    UpgradeError::internal(UpgradeStage::Authorized, InternalError::StateQuery(other))
                }
            })?;
        tracing::debug!(parent: &ctx.span, current_version = %version, "predecessor found");

        self.services
            .rooms
            .current_state(&ctx.predecessor)
            .await
            .map_err(|e| {
                tracing::error!(parent: &ctx.span, error = %e, "current state query failed");
                UpgradeError::internal(UpgradeStage::Authorized, InternalError::StateQuery(e))
            })
    }

    async fn create_successor(
        &self,
        ctx: &UpgradeContext,
        successor: &RoomId,
        snapshot: &StateSnapshot,
        tombstone: &EventId,
    ) -> Result<(), UpgradeError> {
        let request = CreateRoomRequest::from_snapshot(
            successor.clone(),
            ctx.new_version.clone(),
            snapshot,
            PreviousRoom {
                room_id: ctx.predecessor.clone(),
                event_id: tombstone.clone(),
            },
        );

        let created = self
            .services
            .creator
            .create_room(&request, &ctx.requester)
            .await
            .map_err(|e| {
                tracing::error!(
                    parent: &ctx.span,
                    status = e.status,
                    errcode = %e.errcode,
                    error = %e.error,
                    "successor creation failed"
                );
                UpgradeError::CreateFailed(e)
            })?;

        if created.room_id != *successor {
            return Err(UpgradeError::internal(
                UpgradeStage::Created,
                InternalError::SuccessorMismatch {
                    expected: successor.clone(),
                    actual: created.room_id,
                },
            ));
        }

        tracing::info!(parent: &ctx.span, %successor, "successor created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::{CreateRoomError, CreatedRoom};
    use crate::services::{
        MockAliasDirectory, MockEventAuthority, MockEventSink, MockRoomCreator, MockRoomQuery,
    };
    use crate::stage::TerminalState;
    use room_model::{event_type, RoomEvent, StateEvent, StateNeeded, StateTuple};
    use serde_json::json;
    use std::sync::Arc;

    fn room() -> RoomId {
        "!old:x".parse().unwrap()
    }

    fn admin() -> UserId {
        "@admin:x".parse().unwrap()
    }

    fn state() -> RoomState {
        vec![
            StateEvent::new(event_type::CREATE, "", admin(), json!({"creator": "@admin:x"})),
            StateEvent::new(
                event_type::POWER_LEVELS,
                "",
                admin(),
                json!({"users": {"@admin:x": 100}, "state_default": 50}),
            ),
        ]
        .into()
    }

    fn services(
        rooms: MockRoomQuery,
        events: MockEventAuthority,
        sink: MockEventSink,
        creator: MockRoomCreator,
        aliases: MockAliasDirectory,
    ) -> UpgradeServices {
        UpgradeServices {
            rooms: Arc::new(rooms),
            events: Arc::new(events),
            sink: Arc::new(sink),
            creator: Arc::new(creator),
            aliases: Arc::new(aliases),
        }
    }

    /// Mocks whose mutating methods must never be called
    fn no_writes() -> (MockEventAuthority, MockEventSink, MockRoomCreator, MockAliasDirectory) {
        let mut events = MockEventAuthority::new();
        events.expect_state_needed().never();
        events.expect_build_event().never();
        let mut sink = MockEventSink::new();
        sink.expect_commit().never();
        let mut creator = MockRoomCreator::new();
        creator.expect_create_room().never();
        let mut aliases = MockAliasDirectory::new();
        aliases.expect_list_aliases().never();
        aliases.expect_remove_alias().never();
        aliases.expect_set_alias().never();
        (events, sink, creator, aliases)
    }

    fn working_events() -> (MockEventAuthority, MockEventSink) {
        let mut events = MockEventAuthority::new();
        events.expect_state_needed().returning(|_| {
            Ok([StateTuple::new(event_type::CREATE, "")].into_iter().collect::<StateNeeded>())
        });
        events.expect_build_event().returning(|d, _, _, _| {
            Ok(RoomEvent {
                event_id: "$tomb".parse().unwrap(),
                room_id: d.room_id.clone(),
                sender: d.sender.clone(),
                event_type: d.event_type.clone(),
                state_key: d.state_key.clone(),
                content: d.content.clone(),
                origin_server_ts: 0,
                auth_events: vec![],
                prev_events: vec![],
                depth: 2,
            })
        });
        let mut sink = MockEventSink::new();
        sink.expect_commit().returning(|_, _, _| Ok(()));
        (events, sink)
    }

    #[tokio::test]
    async fn unsupported_version_touches_nothing() {
        let mut rooms = MockRoomQuery::new();
        rooms.expect_room_version().never();
        rooms.expect_current_state().never();
        let (events, sink, creator, aliases) = no_writes();
        let upgrader = RoomUpgrader::new(
            UpgradeConfig::default(),
            services(rooms, events, sink, creator, aliases),
        );

        let err = upgrader
            .upgrade(&room(), &admin(), &RoomVersionId::from("99"))
            .await
            .unwrap_err();
        assert_eq!(err.terminal_state(), TerminalState::RejectedVersion);
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let mut rooms = MockRoomQuery::new();
        rooms
            .expect_room_version()
            .returning(|r| Err(ServiceError::NotFound(r.to_string())));
        rooms.expect_current_state().never();
        let (events, sink, creator, aliases) = no_writes();
        let upgrader = RoomUpgrader::new(
            UpgradeConfig::default(),
            services(rooms, events, sink, creator, aliases),
        );

        let err = upgrader
            .upgrade(&room(), &admin(), &RoomVersionId::from("10"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpgradeError::NotFound(ref r) if *r == room()));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn unprivileged_requester_touches_nothing() {
        let mut rooms = MockRoomQuery::new();
        rooms
            .expect_room_version()
            .returning(|_| Ok(RoomVersionId::from("1")));
        rooms.expect_current_state().returning(|_| Ok(state()));
        let (events, sink, creator, aliases) = no_writes();
        let upgrader = RoomUpgrader::new(
            UpgradeConfig::default(),
            services(rooms, events, sink, creator, aliases),
        );

        let err = upgrader
            .upgrade(&room(), &"@guest:x".parse().unwrap(), &RoomVersionId::from("10"))
            .await
            .unwrap_err();
        assert_eq!(err.terminal_state(), TerminalState::Forbidden);
        assert_eq!(err.errcode(), "M_FORBIDDEN");
    }

    #[tokio::test]
    async fn create_failure_passes_through_and_skips_aliases() {
        let mut rooms = MockRoomQuery::new();
        rooms
            .expect_room_version()
            .returning(|_| Ok(RoomVersionId::from("1")));
        rooms.expect_current_state().returning(|_| Ok(state()));
        let (events, sink) = working_events();
        let mut creator = MockRoomCreator::new();
        creator
            .expect_create_room()
            .times(1)
            .returning(|_, _| Err(CreateRoomError::bad_request("M_ROOM_IN_USE", "taken")));
        let mut aliases = MockAliasDirectory::new();
        aliases.expect_list_aliases().never();

        let upgrader = RoomUpgrader::new(
            UpgradeConfig::default(),
            services(rooms, events, sink, creator, aliases),
        );
        let err = upgrader
            .upgrade(&room(), &admin(), &RoomVersionId::from("10"))
            .await
            .unwrap_err();
        assert_eq!(err.errcode(), "M_ROOM_IN_USE");
        assert_eq!(err.terminal_state(), TerminalState::CreateFailed);
        assert!(!err.predecessor_untouched());
    }

    #[tokio::test]
    async fn successful_upgrade_links_predecessor() {
        let mut rooms = MockRoomQuery::new();
        rooms
            .expect_room_version()
            .returning(|_| Ok(RoomVersionId::from("1")));
        rooms.expect_current_state().returning(|_| Ok(state()));
        let (events, sink) = working_events();
        let mut creator = MockRoomCreator::new();
        creator
            .expect_create_room()
            .withf(|req, _| {
                req.predecessor().is_some_and(|p| {
                    p.room_id.as_str() == "!old:x" && p.event_id.as_str() == "$tomb"
                }) && req.room_version.as_str() == "10"
                    && req.guest_can_join
            })
            .returning(|req, _| {
                Ok(CreatedRoom {
                    room_id: req.room_id.clone(),
                })
            });
        let mut aliases = MockAliasDirectory::new();
        aliases.expect_list_aliases().returning(|_| Ok(vec![]));

        let upgrader = RoomUpgrader::new(
            UpgradeConfig::default(),
            services(rooms, events, sink, creator, aliases),
        );
        let outcome = upgrader
            .upgrade(&room(), &admin(), &RoomVersionId::from("10"))
            .await
            .unwrap();

        assert_eq!(outcome.tombstone.as_str(), "$tomb");
        assert_eq!(outcome.replacement_room.server_name(), "localhost");
        assert!(!outcome.canonical_republished);
        assert_eq!(
            outcome.stages,
            vec![
                UpgradeStage::Requested,
                UpgradeStage::Validated,
                UpgradeStage::Authorized,
                UpgradeStage::Snapshotted,
                UpgradeStage::Tombstoned,
                UpgradeStage::Created,
                UpgradeStage::AliasesMigrated,
                UpgradeStage::Done,
            ]
        );
    }

    #[tokio::test]
    async fn creator_returning_other_room_is_internal() {
        let mut rooms = MockRoomQuery::new();
        rooms
            .expect_room_version()
            .returning(|_| Ok(RoomVersionId::from("1")));
        rooms.expect_current_state().returning(|_| Ok(state()));
        let (events, sink) = working_events();
        let mut creator = MockRoomCreator::new();
        creator.expect_create_room().returning(|_, _| {
            Ok(CreatedRoom {
                room_id: "!elsewhere:x".parse().unwrap(),
            })
        });
        let mut aliases = MockAliasDirectory::new();
        aliases.expect_list_aliases().never();

        let upgrader = RoomUpgrader::new(
            UpgradeConfig::default(),
            services(rooms, events, sink, creator, aliases),
        );
        let err = upgrader
            .upgrade(&room(), &admin(), &RoomVersionId::from("10"))
            .await
            .unwrap_err();
        assert_eq!(err.terminal_state(), TerminalState::CreateFailed);
        assert_eq!(err.client_message(), crate::error::INTERNAL_MESSAGE);
    }

    #[test]
    fn context_starts_requested() {
        let ctx = UpgradeContext::new(room(), admin(), RoomVersionId::from("10"));
        assert_eq!(ctx.stage(), UpgradeStage::Requested);
        assert_eq!(ctx.trace().stages(), &[UpgradeStage::Requested]);
    }
}
