//! Power levels
//!
//! Per-user privilege mapping plus the thresholds that gate state changes.
//! A state mutation by user `U` is permitted only if
//! `user_level(U) >= state_default` (per-type overrides aside).

use crate::id::UserId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Level granted to the creator of a fresh room
pub const CREATOR_LEVEL: i64 = 100;

/// `m.room.power_levels` content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLevels {
    /// Explicit per-user levels
    #[serde(default, deserialize_with = "level_map")]
    pub users: BTreeMap<UserId, i64>,
    /// Level of users not listed in `users`
    #[serde(default, deserialize_with = "level")]
    pub users_default: i64,
    /// Threshold for sending state events
    #[serde(default = "default_state_level", deserialize_with = "level")]
    pub state_default: i64,
    /// Threshold for sending message events
    #[serde(default, deserialize_with = "level")]
    pub events_default: i64,
    /// Per-event-type thresholds
    #[serde(default, deserialize_with = "level_map")]
    pub events: BTreeMap<String, i64>,
    /// Threshold for banning
    #[serde(default = "default_state_level", deserialize_with = "level")]
    pub ban: i64,
    /// Threshold for kicking
    #[serde(default = "default_state_level", deserialize_with = "level")]
    pub kick: i64,
    /// Threshold for redacting others' events
    #[serde(default = "default_state_level", deserialize_with = "level")]
    pub redact: i64,
    /// Threshold for inviting
    #[serde(default, deserialize_with = "level")]
    pub invite: i64,
}

fn default_state_level() -> i64 {
    50
}

/// Integer or integer-as-string, as older rooms carry both
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Int(i64),
    Str(String),
}

impl RawLevel {
    fn into_level<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            RawLevel::Int(v) => Ok(v),
            RawLevel::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("power level '{s}' is not an integer"))),
        }
    }
}

fn level<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    RawLevel::deserialize(d)?.into_level()
}

fn level_map<'de, D, K>(d: D) -> Result<BTreeMap<K, i64>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord,
{
    BTreeMap::<K, RawLevel>::deserialize(d)?
        .into_iter()
        .map(|(k, v)| Ok((k, v.into_level()?)))
        .collect()
}

impl Default for PowerLevels {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            users_default: 0,
            state_default: default_state_level(),
            events_default: 0,
            events: BTreeMap::new(),
            ban: default_state_level(),
            kick: default_state_level(),
            redact: default_state_level(),
            invite: 0,
        }
    }
}

impl PowerLevels {
    /// Defaults for a new room, with `creator` at [`CREATOR_LEVEL`]
    #[must_use]
    pub fn for_creator(creator: &UserId) -> Self {
        let mut levels = Self::default();
        levels.users.insert(creator.clone(), CREATOR_LEVEL);
        levels
    }

    /// Effective level of `user`
    #[inline]
    #[must_use]
    pub fn user_level(&self, user: &UserId) -> i64 {
        self.users.get(user).copied().unwrap_or(self.users_default)
    }

    /// Threshold for sending a state event of `event_type`
    #[inline]
    #[must_use]
    pub fn state_level(&self, event_type: &str) -> i64 {
        self.events
            .get(event_type)
            .copied()
            .unwrap_or(self.state_default)
    }

    /// Whether `user` clears the room-wide `state_default` threshold
    #[inline]
    #[must_use]
    pub fn can_send_state(&self, user: &UserId) -> bool {
        self.user_level(user) >= self.state_default
    }

    /// Whether `user` may send a state event of `event_type`
    #[inline]
    #[must_use]
    pub fn can_send_state_type(&self, user: &UserId, event_type: &str) -> bool {
        self.user_level(user) >= self.state_level(event_type)
    }
}
