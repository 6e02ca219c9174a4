//! Room and homeserver fixtures

use room_memory::MemoryHomeserver;
use room_model::{event_type, RoomAliasId, RoomId, RoomVersionId, ServerName, StateEvent, UserId};
use room_upgrade::{ServiceError, UpgradeConfig};
use serde_json::{json, Value};

/// Server every fixture lives on
pub const SERVER: &str = "x";

pub fn user(s: &str) -> UserId {
    s.parse().unwrap()
}

pub fn room_id(s: &str) -> RoomId {
    s.parse().unwrap()
}

pub fn alias(s: &str) -> RoomAliasId {
    s.parse().unwrap()
}

pub fn server() -> ServerName {
    SERVER.parse().unwrap()
}

/// Empty homeserver on [`SERVER`]
pub fn homeserver() -> MemoryHomeserver {
    MemoryHomeserver::new(server())
}

/// Upgrade configuration minting successors on [`SERVER`]
pub fn config() -> UpgradeConfig {
    UpgradeConfig::default().with_server_name(server())
}

/// Builder for a predecessor room
#[derive(Debug, Clone)]
pub struct RoomFixture {
    pub room_id: RoomId,
    pub version: RoomVersionId,
    pub creator: UserId,
    pub state: Vec<StateEvent>,
    pub aliases: Vec<RoomAliasId>,
}

impl RoomFixture {
    /// Create event plus the creator's join
    pub fn new(room: &str, version: &str, creator: &str) -> Self {
        let creator = user(creator);
        let state = vec![
            StateEvent::new(
                event_type::CREATE,
                "",
                creator.clone(),
                json!({"creator": creator, "room_version": version}),
            ),
            StateEvent::new(
                event_type::MEMBER,
                creator.as_str(),
                creator.clone(),
                json!({"membership": "join"}),
            ),
        ];
        Self {
            room_id: room_id(room),
            version: version.into(),
            creator,
            state,
            aliases: Vec::new(),
        }
    }

    /// Arbitrary state event sent by the creator
    pub fn with_state(mut self, ty: &str, state_key: &str, content: Value) -> Self {
        self.state
            .push(StateEvent::new(ty, state_key, self.creator.clone(), content));
        self
    }

    /// Power levels content
    pub fn with_power_levels(self, content: Value) -> Self {
        self.with_state(event_type::POWER_LEVELS, "", content)
    }

    /// Power levels with `users` at the given levels
    pub fn with_levels(self, users: &[(&str, i64)], state_default: i64) -> Self {
        let users: serde_json::Map<String, Value> = users
            .iter()
            .map(|(u, l)| ((*u).to_string(), json!(l)))
            .collect();
        self.with_power_levels(json!({"users": users, "state_default": state_default}))
    }

    /// Joined member
    pub fn with_member(self, member: &str) -> Self {
        self.with_state(event_type::MEMBER, member, json!({"membership": "join"}))
    }

    pub fn with_name(self, name: &str) -> Self {
        self.with_state(event_type::NAME, "", json!({ "name": name }))
    }

    pub fn with_topic(self, topic: &str) -> Self {
        self.with_state(event_type::TOPIC, "", json!({ "topic": topic }))
    }

    pub fn with_guest_access(self, token: &str) -> Self {
        self.with_state(event_type::GUEST_ACCESS, "", json!({ "guest_access": token }))
    }

    /// Canonical alias designation
    pub fn with_canonical_alias(self, primary: &str, alternates: &[&str]) -> Self {
        self.with_state(
            event_type::CANONICAL_ALIAS,
            "",
            json!({"alias": primary, "alt_aliases": alternates}),
        )
    }

    /// Alias bound to this room by the creator
    pub fn with_alias(mut self, a: &str) -> Self {
        self.aliases.push(alias(a));
        self
    }

    /// Add the room and its aliases to `hs`
    ///
    /// # Errors
    /// Returns [`ServiceError`] if the room or an alias already exists.
    pub fn install(self, hs: &MemoryHomeserver) -> Result<RoomId, ServiceError> {
        hs.insert_room(self.room_id.clone(), self.version, self.state)?;
        for a in self.aliases {
            hs.bind_alias(a, self.room_id.clone(), self.creator.clone())?;
        }
        Ok(self.room_id)
    }
}

/// Version 1 room, guest access unset, aliases `#a:x` and `#b:x`,
/// canonical alias `#a:x`, administered by `@admin:x`
pub fn example_room() -> RoomFixture {
    RoomFixture::new("!r1:x", "1", "@admin:x")
        .with_levels(&[("@admin:x", 100)], 50)
        .with_name("Lobby")
        .with_alias("#a:x")
        .with_alias("#b:x")
        .with_canonical_alias("#a:x", &[])
}
