//! Typed event contents
//!
//! Only the contents the upgrade path reads or writes are modeled; every
//! other type stays an opaque [`serde_json::Value`].

use crate::id::{EventId, RoomAliasId, RoomId, UserId};
use crate::version::RoomVersionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content decoding errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// Content does not match the expected shape
    #[error("malformed {event_type} content: {source}")]
    Malformed {
        /// Event type whose content failed to decode
        event_type: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },
}

/// `m.room.tombstone`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneContent {
    /// Human-readable explanation
    pub body: String,
    /// Successor room
    pub replacement_room: RoomId,
}

/// Back-reference from a successor to the room it replaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousRoom {
    /// Predecessor room
    pub room_id: RoomId,
    /// Tombstone event committed in the predecessor
    pub event_id: EventId,
}

/// `m.room.create`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateContent {
    /// Room creator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserId>,
    /// Room version (absent means `"1"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_version: Option<RoomVersionId>,
    /// Predecessor lineage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<PreviousRoom>,
    /// Other creation keys, preserved as given
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl CreateContent {
    /// Effective room version
    #[must_use]
    pub fn room_version(&self) -> RoomVersionId {
        self.room_version
            .clone()
            .unwrap_or_else(|| RoomVersionId::new("1"))
    }
}

/// `m.room.canonical_alias`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalAliasContent {
    /// Preferred alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<RoomAliasId>,
    /// Alternate aliases
    #[serde(default)]
    pub alt_aliases: Vec<RoomAliasId>,
}

impl CanonicalAliasContent {
    /// Every alias named by the designation, primary first
    pub fn aliases(&self) -> impl Iterator<Item = &RoomAliasId> {
        self.alias.iter().chain(self.alt_aliases.iter())
    }

    /// Decode raw content, keeping every entry that parses
    ///
    /// An empty or missing `alias` means no primary alias. Entries that are
    /// not valid alias identifiers are returned alongside, as given.
    #[must_use]
    pub fn from_content_lenient(content: &Value) -> (Self, Vec<String>) {
        let mut rejected = Vec::new();
        let alias = content
            .get("alias")
            .and_then(|raw| lenient_alias(raw, &mut rejected));
        let alt_aliases = match content.get("alt_aliases") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|raw| lenient_alias(raw, &mut rejected))
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                rejected.push(other.to_string());
                Vec::new()
            }
        };

        (Self { alias, alt_aliases }, rejected)
    }
}

fn lenient_alias(raw: &Value, rejected: &mut Vec<String>) -> Option<RoomAliasId> {
    match raw {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => match s.parse() {
            Ok(alias) => Some(alias),
            Err(_) => {
                rejected.push(s.clone());
                None
            }
        },
        other => {
            rejected.push(other.to_string());
            None
        }
    }
}

/// `m.room.guest_access`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestAccess {
    /// Guests may join
    CanJoin,
    /// Guests are refused
    Forbidden,
}

impl GuestAccess {
    /// Read guest access from raw content
    ///
    /// Anything other than the literal `"forbidden"` token means guests may
    /// join; malformed or missing values do not lock guests out.
    #[must_use]
    pub fn from_content(content: &Value) -> Self {
        match content.get("guest_access").and_then(Value::as_str) {
            Some("forbidden") => Self::Forbidden,
            _ => Self::CanJoin,
        }
    }

    /// Whether guests may join
    #[inline]
    #[must_use]
    pub fn can_join(self) -> bool {
        matches!(self, Self::CanJoin)
    }

    /// Wire token
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanJoin => "can_join",
            Self::Forbidden => "forbidden",
        }
    }
}

/// `m.room.history_visibility` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryVisibility {
    /// Visible from the point a member was invited
    Invited,
    /// Visible from the point a member joined
    Joined,
    /// Visible to all members, including past history
    Shared,
    /// Visible to anyone
    WorldReadable,
}

/// `m.room.history_visibility`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryVisibilityContent {
    /// Visibility setting
    pub history_visibility: HistoryVisibility,
}

/// `m.room.join_rules` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRule {
    /// Anyone may join
    Public,
    /// Users may knock
    Knock,
    /// Invite only
    Invite,
    /// Reserved
    Private,
    /// Membership of other rooms grants access
    Restricted,
    /// Restricted, with knocking
    KnockRestricted,
}

/// `m.room.join_rules`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRulesContent {
    /// Join rule
    pub join_rule: JoinRule,
}

/// `m.room.member` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// Joined
    Join,
    /// Invited
    Invite,
    /// Left or kicked
    Leave,
    /// Banned
    Ban,
    /// Knocking
    Knock,
}

/// `m.room.member`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberContent {
    /// Membership state
    pub membership: Membership,
}

/// `m.room.name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameContent {
    /// Room name
    pub name: String,
}

/// `m.room.topic`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicContent {
    /// Room topic
    pub topic: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn guest_access_defaults_to_can_join() {
        assert_eq!(GuestAccess::from_content(&json!({})), GuestAccess::CanJoin);
        assert_eq!(
            GuestAccess::from_content(&json!({"guest_access": "can_join"})),
            GuestAccess::CanJoin
        );
        assert_eq!(
            GuestAccess::from_content(&json!({"guest_access": 7})),
            GuestAccess::CanJoin
        );
        assert_eq!(
            GuestAccess::from_content(&json!({"guest_access": "forbidden"})),
            GuestAccess::Forbidden
        );
    }

    proptest! {
        #[test]
        fn prop_only_forbidden_token_blocks_guests(token in "[a-z_]{0,12}") {
            let access = GuestAccess::from_content(&json!({ "guest_access": token }));
            prop_assert_eq!(access.can_join(), token != "forbidden");
        }
    }

    #[test]
    fn create_content_keeps_unknown_keys() {
        let content: CreateContent =
            serde_json::from_value(json!({"creator": "@a:x", "m.federate": false})).unwrap();
        assert_eq!(content.room_version().as_str(), "1");
        assert_eq!(content.extra.get("m.federate"), Some(&json!(false)));

        let back = serde_json::to_value(&content).unwrap();
        assert_eq!(back["m.federate"], json!(false));
        assert!(back.get("predecessor").is_none());
    }

    #[test]
    fn canonical_alias_lists_primary_first() {
        let content: CanonicalAliasContent = serde_json::from_value(json!({
            "alias": "#a:x",
            "alt_aliases": ["#b:x"]
        }))
        .unwrap();
        let all: Vec<_> = content.aliases().map(RoomAliasId::as_str).collect();
        assert_eq!(all, ["#a:x", "#b:x"]);
    }

    #[test]
    fn lenient_canonical_alias_treats_empty_as_absent() {
        let (content, rejected) =
            CanonicalAliasContent::from_content_lenient(&json!({"alias": ""}));
        assert_eq!(content, CanonicalAliasContent::default());
        assert!(rejected.is_empty());
    }

    #[test]
    fn lenient_canonical_alias_keeps_valid_entries() {
        let (content, rejected) = CanonicalAliasContent::from_content_lenient(&json!({
            "alias": "lobby",
            "alt_aliases": ["#b:x", "", "#c", 7, "#d:x"]
        }));
        assert_eq!(content.alias, None);
        let alts: Vec<_> = content.alt_aliases.iter().map(RoomAliasId::as_str).collect();
        assert_eq!(alts, ["#b:x", "#d:x"]);
        assert_eq!(rejected, ["lobby", "#c", "7"]);
    }

    #[test]
    fn unknown_join_rule_is_malformed() {
        let parsed: Result<JoinRulesContent, _> =
            serde_json::from_value(json!({"join_rule": "whoever"}));
        assert!(parsed.is_err());
    }
}
