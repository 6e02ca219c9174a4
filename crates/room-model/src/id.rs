//! Server-scoped identifiers
//!
//! Provides [`RoomId`], [`EventId`], [`UserId`], [`RoomAliasId`] and
//! [`ServerName`]. Every identifier is an opaque string with a one-character
//! sigil; all but event ids carry a `:server` suffix.
//!
//! # Examples
//! - `!abcdef:example.org` is a room id
//! - `#lobby:example.org` is a room alias
//! - `@alice:example.org` is a user id
//! - `$Jd8aG...` is an event id

use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Errors produced when parsing an identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Identifier is empty
    #[error("identifier is empty")]
    Empty,

    /// Wrong or missing leading sigil
    #[error("identifier '{value}' must start with '{expected}'")]
    MissingSigil { expected: char, value: String },

    /// No `:server` part
    #[error("identifier '{0}' has no server name")]
    MissingServerName(String),

    /// Nothing between the sigil and the server name
    #[error("identifier '{0}' has an empty localpart")]
    EmptyLocalpart(String),

    /// Server name is empty or contains whitespace
    #[error("invalid server name: '{0}'")]
    InvalidServerName(String),
}

/// Name of a homeserver (`example.org`, `localhost:8448`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerName(String);

impl ServerName {
    /// `localhost`
    #[must_use]
    pub fn localhost() -> Self {
        Self("localhost".to_string())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ServerName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(IdError::InvalidServerName(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ServerName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServerName> for String {
    fn from(value: ServerName) -> Self {
        value.0
    }
}

impl Display for ServerName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate `<sigil><localpart>[:<server>]`
fn validate(value: &str, sigil: char, needs_server: bool) -> Result<(), IdError> {
    let Some(rest) = value.strip_prefix(sigil) else {
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        return Err(IdError::MissingSigil {
            expected: sigil,
            value: value.to_string(),
        });
    };

    if !needs_server {
        if rest.is_empty() {
            return Err(IdError::EmptyLocalpart(value.to_string()));
        }
        return Ok(());
    }

    let Some((local, server)) = rest.split_once(':') else {
        return Err(IdError::MissingServerName(value.to_string()));
    };
    if local.is_empty() {
        return Err(IdError::EmptyLocalpart(value.to_string()));
    }
    ServerName::from_str(server)?;
    Ok(())
}

macro_rules! sigil_id {
    ($(#[$meta:meta])* $name:ident, $sigil:literal, $needs_server:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Leading sigil character
            pub const SIGIL: char = $sigil;

            /// Borrow as string slice
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Text between the sigil and the server name
            #[must_use]
            pub fn localpart(&self) -> &str {
                let rest = &self.0[1..];
                rest.split_once(':').map_or(rest, |(local, _)| local)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate(s, $sigil, $needs_server)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate(&value, $sigil, $needs_server)?;
                Ok(Self(value))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

sigil_id!(
    /// Room identifier (`!opaque:server`)
    RoomId,
    '!',
    true
);

sigil_id!(
    /// Event identifier (`$opaque`, optionally `$opaque:server` in old room versions)
    EventId,
    '$',
    false
);

sigil_id!(
    /// User identifier (`@localpart:server`)
    UserId,
    '@',
    true
);

sigil_id!(
    /// Human-readable room alias (`#name:server`)
    RoomAliasId,
    '#',
    true
);

/// Server name part of a `:server`-scoped identifier
fn server_part(value: &str) -> Option<&str> {
    value.split_once(':').map(|(_, server)| server)
}

impl RoomId {
    /// Allocate a fresh room id on `server`
    ///
    /// The localpart is `len` random ASCII alphanumerics drawn from the
    /// thread-local CSPRNG, so two calls collide with negligible probability.
    #[must_use]
    pub fn random(server: &ServerName, len: usize) -> Self {
        let local = Alphanumeric.sample_string(&mut rand::rng(), len.max(1));
        Self(format!("!{local}:{server}"))
    }

    /// Server the room id was minted on
    #[must_use]
    pub fn server_name(&self) -> &str {
        server_part(&self.0).unwrap_or_default()
    }
}

impl UserId {
    /// Server the user belongs to
    #[must_use]
    pub fn server_name(&self) -> &str {
        server_part(&self.0).unwrap_or_default()
    }
}

impl RoomAliasId {
    /// Server the alias is published on
    #[must_use]
    pub fn server_name(&self) -> &str {
        server_part(&self.0).unwrap_or_default()
    }
}
