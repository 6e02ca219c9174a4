//! End-to-end upgrade behaviour against the in-memory homeserver

use pretty_assertions::assert_eq;
use room_model::{
    event_type, CanonicalAliasContent, CreateContent, GuestAccess, RoomId, RoomVersionId,
    TombstoneContent,
};
use room_test_utils::{alias, example_room, homeserver, room_id, user, Harness, RoomFixture};
use room_upgrade::{TerminalState, UpgradeError, UpgradeStage};

fn v(s: &str) -> RoomVersionId {
    s.into()
}

fn tombstones(harness: &Harness, room: &RoomId) -> Vec<TombstoneContent> {
    harness
        .hs
        .events_of(room)
        .iter()
        .filter(|e| e.event_type == event_type::TOMBSTONE)
        .map(|e| serde_json::from_value(e.content.clone()).unwrap())
        .collect()
}

#[tokio::test]
async fn unsupported_version_issues_no_mutations() {
    for version in ["0", "99", "org.example.custom", ""] {
        let harness = Harness::example();
        let err = harness
            .upgrader
            .upgrade(&room_id("!r1:x"), &user("@admin:x"), &v(version))
            .await
            .unwrap_err();

        assert_eq!(err.terminal_state(), TerminalState::RejectedVersion);
        assert!(harness.backend.calls().is_empty(), "{version}: {:?}", harness.backend.calls());
        assert_eq!(harness.hs.room_count(), 1);
    }
}

#[tokio::test]
async fn disabled_version_is_rejected_like_an_unknown_one() {
    let hs = homeserver();
    example_room().install(&hs).unwrap();
    let config = room_test_utils::config().with_supported_versions(["9", "10"]);
    let harness = Harness::with_config(hs, config);

    let err = harness
        .upgrader
        .upgrade(&room_id("!r1:x"), &user("@admin:x"), &v("2"))
        .await
        .unwrap_err();
    assert_eq!(err.terminal_state(), TerminalState::RejectedVersion);
    assert!(harness.backend.mutations().is_empty());
}

#[tokio::test]
async fn low_power_requester_is_forbidden_and_room_unchanged() {
    let hs = homeserver();
    example_room().with_member("@bob:x").install(&hs).unwrap();
    let harness = Harness::new(hs);
    let room = room_id("!r1:x");
    let before = harness.hs.state_of(&room).unwrap();

    let err = harness
        .upgrader
        .upgrade(&room, &user("@bob:x"), &v("2"))
        .await
        .unwrap_err();

    assert!(matches!(err, UpgradeError::Forbidden(_)));
    assert!(err.predecessor_untouched());
    assert!(harness.backend.mutations().is_empty());
    assert_eq!(harness.hs.state_of(&room).unwrap(), before);
    assert_eq!(harness.hs.aliases_of(&room), vec![alias("#a:x"), alias("#b:x")]);
    assert_eq!(harness.hs.room_count(), 1);
}

#[tokio::test]
async fn room_without_power_levels_is_unrestricted() {
    let hs = homeserver();
    RoomFixture::new("!open:x", "5", "@admin:x")
        .with_member("@bob:x")
        .install(&hs)
        .unwrap();
    let harness = Harness::new(hs);

    let outcome = harness
        .upgrader
        .upgrade(&room_id("!open:x"), &user("@bob:x"), &v("10"))
        .await
        .unwrap();
    assert_eq!(harness.hs.version_of(&outcome.replacement_room), Some(v("10")));
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let harness = Harness::example();
    let err = harness
        .upgrader
        .upgrade(&room_id("!missing:x"), &user("@admin:x"), &v("2"))
        .await
        .unwrap_err();

    assert!(matches!(err, UpgradeError::NotFound(ref r) if *r == room_id("!missing:x")));
    assert_eq!(err.terminal_state(), TerminalState::NotFound);
    assert!(harness.backend.mutations().is_empty());
}

#[tokio::test]
async fn creation_content_points_back_at_the_tombstone() {
    let harness = Harness::example();
    let room = room_id("!r1:x");
    let outcome = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("2"))
        .await
        .unwrap();

    let successor = harness.hs.state_of(&outcome.replacement_room).unwrap();
    let create: CreateContent = successor.create_content().unwrap().unwrap();
    let predecessor = create.predecessor.unwrap();
    assert_eq!(predecessor.room_id, room);
    assert_eq!(predecessor.event_id, outcome.tombstone);

    let committed = harness
        .hs
        .events_of(&room)
        .into_iter()
        .find(|e| e.event_type == event_type::TOMBSTONE)
        .unwrap();
    assert_eq!(committed.event_id, outcome.tombstone);
}

#[tokio::test]
async fn every_alias_is_moved_or_left_in_place() {
    let hs = homeserver();
    let room = example_room().with_alias("#c:x").install(&hs).unwrap();
    let harness = Harness::new(hs);
    harness.backend.inject(room_test_utils::Fault::MoveAlias {
        alias: alias("#b:x"),
        home: room.clone(),
    });
    harness
        .backend
        .inject(room_test_utils::Fault::RemoveAlias(alias("#c:x")));

    let outcome = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("2"))
        .await
        .unwrap();
    let successor = outcome.replacement_room.clone();

    for a in ["#a:x", "#b:x", "#c:x"] {
        let a = alias(a);
        let bound_to = harness.hs.resolve_alias(&a);
        if outcome.aliases.was_migrated(&a) {
            assert_eq!(bound_to, Some(successor.clone()), "{a}");
        } else {
            assert_eq!(bound_to, Some(room.clone()), "{a}");
            assert!(outcome.aliases.failed.iter().any(|f| f.alias == a && f.restored));
        }
    }
    assert_eq!(outcome.aliases.migrated, vec![alias("#a:x")]);
    assert_eq!(outcome.aliases.failed.len(), 2);
    assert!(!outcome.aliases.is_complete());
}

#[tokio::test]
async fn canonical_alias_is_republished_once_aliases_moved() {
    let hs = homeserver();
    let room = example_room()
        .with_canonical_alias("#a:x", &["#b:x"])
        .install(&hs)
        .unwrap();
    let harness = Harness::new(hs);

    let outcome = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("6"))
        .await
        .unwrap();
    assert!(outcome.canonical_republished);
    assert!(outcome.aliases.is_complete());

    let state = harness.hs.state_of(&outcome.replacement_room).unwrap();
    let canonical: CanonicalAliasContent = state
        .get(event_type::CANONICAL_ALIAS, "")
        .unwrap()
        .content_as()
        .unwrap();
    assert_eq!(canonical.alias, Some(alias("#a:x")));
    assert_eq!(canonical.alt_aliases, vec![alias("#b:x")]);
}

#[tokio::test]
async fn repeated_upgrades_are_not_deduplicated() {
    let hs = homeserver();
    let room = RoomFixture::new("!twice:x", "1", "@admin:x")
        .with_levels(&[("@admin:x", 100)], 50)
        .install(&hs)
        .unwrap();
    let harness = Harness::new(hs);

    let first = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("2"))
        .await
        .unwrap();
    let second = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("2"))
        .await
        .unwrap();

    assert_ne!(first.replacement_room, second.replacement_room);
    assert_ne!(first.tombstone, second.tombstone);
    assert_eq!(harness.hs.room_count(), 3);

    let replacements: Vec<RoomId> = tombstones(&harness, &room)
        .into_iter()
        .map(|t| t.replacement_room)
        .collect();
    assert_eq!(replacements, vec![first.replacement_room, second.replacement_room]);
}

#[tokio::test]
async fn example_room_upgrade() {
    let harness = Harness::example();
    let r1 = room_id("!r1:x");

    let outcome = harness
        .upgrader
        .upgrade(&r1, &user("@admin:x"), &v("2"))
        .await
        .unwrap();
    let r2 = outcome.replacement_room.clone();
    assert_ne!(r1, r2);
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
            UpgradeStage::CanonicalRepublished,
            UpgradeStage::Done,
        ]
    );

    // R1 gains a tombstone naming R2
    let tomb = tombstones(&harness, &r1);
    assert_eq!(tomb.len(), 1);
    assert_eq!(tomb[0].replacement_room, r2);
    assert!(harness
        .hs
        .state_of(&r1)
        .unwrap()
        .get(event_type::TOMBSTONE, "")
        .is_some());

    // R2 carries version, guest access, name and aliases
    let state = harness.hs.state_of(&r2).unwrap();
    assert_eq!(harness.hs.version_of(&r2), Some(v("2")));
    let guest = state.get(event_type::GUEST_ACCESS, "").unwrap();
    assert!(GuestAccess::from_content(&guest.content).can_join());
    assert_eq!(
        state.get(event_type::NAME, "").unwrap().content["name"],
        serde_json::json!("Lobby")
    );
    assert_eq!(
        state.get(event_type::POWER_LEVELS, "").unwrap().content,
        serde_json::json!({"users": {"@admin:x": 100}, "state_default": 50})
    );
    assert_eq!(harness.hs.aliases_of(&r2), vec![alias("#a:x"), alias("#b:x")]);
    assert!(harness.hs.aliases_of(&r1).is_empty());

    let canonical: CanonicalAliasContent = state
        .get(event_type::CANONICAL_ALIAS, "")
        .unwrap()
        .content_as()
        .unwrap();
    assert_eq!(canonical.alias, Some(alias("#a:x")));
}

#[tokio::test]
async fn forbidden_guest_access_is_carried_over() {
    let hs = homeserver();
    let room = RoomFixture::new("!g:x", "4", "@admin:x")
        .with_guest_access("forbidden")
        .with_topic("quiet")
        .install(&hs)
        .unwrap();
    let harness = Harness::new(hs);

    let outcome = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("9"))
        .await
        .unwrap();
    let state = harness.hs.state_of(&outcome.replacement_room).unwrap();
    let guest = state.get(event_type::GUEST_ACCESS, "").unwrap();
    assert!(!GuestAccess::from_content(&guest.content).can_join());
    assert_eq!(
        state.get(event_type::TOPIC, "").unwrap().content["topic"],
        serde_json::json!("quiet")
    );
    assert!(!outcome.canonical_republished);
}

#[tokio::test]
async fn cleared_canonical_alias_does_not_block_upgrade() {
    let hs = homeserver();
    let room = RoomFixture::new("!cleared:x", "1", "@admin:x")
        .with_levels(&[("@admin:x", 100)], 50)
        .with_state(event_type::CANONICAL_ALIAS, "", serde_json::json!({"alias": ""}))
        .install(&hs)
        .unwrap();
    let harness = Harness::new(hs);

    let outcome = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("2"))
        .await
        .unwrap();

    assert!(outcome.canonical_republished);
    let state = harness.hs.state_of(&outcome.replacement_room).unwrap();
    let canonical: CanonicalAliasContent = state
        .get(event_type::CANONICAL_ALIAS, "")
        .unwrap()
        .content_as()
        .unwrap();
    assert_eq!(canonical, CanonicalAliasContent::default());
}

#[tokio::test]
async fn invalid_alternate_alias_is_dropped_on_republish() {
    let hs = homeserver();
    let room = RoomFixture::new("!alts:x", "1", "@admin:x")
        .with_levels(&[("@admin:x", 100)], 50)
        .with_alias("#a:x")
        .with_state(
            event_type::CANONICAL_ALIAS,
            "",
            serde_json::json!({"alias": null, "alt_aliases": ["lobby", "#a:x"]}),
        )
        .install(&hs)
        .unwrap();
    let harness = Harness::new(hs);

    let outcome = harness
        .upgrader
        .upgrade(&room, &user("@admin:x"), &v("2"))
        .await
        .unwrap();

    assert!(outcome.canonical_republished);
    let state = harness.hs.state_of(&outcome.replacement_room).unwrap();
    let canonical: CanonicalAliasContent = state
        .get(event_type::CANONICAL_ALIAS, "")
        .unwrap()
        .content_as()
        .unwrap();
    assert_eq!(canonical.alias, None);
    assert_eq!(canonical.alt_aliases, vec![alias("#a:x")]);
}
