//! Alias bindings
//!
//! Each alias resolves to at most one room. Binding an alias that is
//! already bound is a conflict, never a silent rebind.

use room_model::{RoomAliasId, RoomId, UserId};
use room_upgrade::ServiceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One alias and the room it resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasBinding {
    /// The alias
    pub alias: RoomAliasId,
    /// Room it resolves to
    pub room_id: RoomId,
    /// Who bound it
    pub creator: UserId,
}

/// Alias table
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    bindings: BTreeMap<RoomAliasId, AliasBinding>,
}

impl AliasTable {
    /// Room `alias` resolves to
    #[must_use]
    pub fn resolve(&self, alias: &RoomAliasId) -> Option<&RoomId> {
        self.bindings.get(alias).map(|b| &b.room_id)
    }

    /// Aliases resolving to `room_id`, sorted
    #[must_use]
    pub fn aliases_of(&self, room_id: &RoomId) -> Vec<RoomAliasId> {
        self.bindings
            .values()
            .filter(|b| &b.room_id == room_id)
            .map(|b| b.alias.clone())
            .collect()
    }

    /// Add a binding
    ///
    /// # Errors
    /// Returns [`ServiceError::Conflict`] if the alias is already bound.
    pub fn bind(&mut self, binding: AliasBinding) -> Result<(), ServiceError> {
        if let Some(existing) = self.bindings.get(&binding.alias) {
            return Err(ServiceError::Conflict(format!(
                "alias {} already points to {}",
                binding.alias, existing.room_id
            )));
        }
        self.bindings.insert(binding.alias.clone(), binding);
        Ok(())
    }

    /// Remove a binding
    ///
    /// Without `purge`, only the user who bound the alias may remove it.
    ///
    /// # Errors
    /// - [`ServiceError::NotFound`] if the alias is not bound
    /// - [`ServiceError::Rejected`] if `requester` may not remove it
    pub fn unbind(
        &mut self,
        alias: &RoomAliasId,
        requester: &UserId,
        purge: bool,
    ) -> Result<AliasBinding, ServiceError> {
        let Some(binding) = self.bindings.get(alias) else {
            return Err(ServiceError::NotFound(format!("alias {alias} is not bound")));
        };
        if !purge && &binding.creator != requester {
            return Err(ServiceError::Rejected(format!(
                "{requester} did not create alias {alias}"
            )));
        }
        self.bindings
            .remove(alias)
            .ok_or_else(|| ServiceError::NotFound(format!("alias {alias} is not bound")))
    }

    /// Every binding, sorted by alias
    pub fn bindings(&self) -> impl Iterator<Item = &AliasBinding> {
        self.bindings.values()
    }

    /// Number of bound aliases
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no alias is bound
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(alias: &str, room: &str, creator: &str) -> AliasBinding {
        AliasBinding {
            alias: alias.parse().unwrap(),
            room_id: room.parse().unwrap(),
            creator: creator.parse().unwrap(),
        }
    }

    #[test]
    fn alias_binds_to_one_room() {
        let mut table = AliasTable::default();
        table.bind(binding("#a:x", "!r1:x", "@u:x")).unwrap();
        let err = table.bind(binding("#a:x", "!r2:x", "@u:x")).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(
            table.resolve(&"#a:x".parse().unwrap()).map(RoomId::as_str),
            Some("!r1:x")
        );
    }

    #[test]
    fn unbind_respects_creator_unless_purged() {
        let mut table = AliasTable::default();
        table.bind(binding("#a:x", "!r1:x", "@owner:x")).unwrap();
        let alias: RoomAliasId = "#a:x".parse().unwrap();
        let admin: UserId = "@admin:x".parse().unwrap();

        assert!(matches!(
            table.unbind(&alias, &admin, false),
            Err(ServiceError::Rejected(_))
        ));
        assert!(table.unbind(&alias, &admin, true).is_ok());
        assert!(matches!(
            table.unbind(&alias, &admin, true),
            Err(ServiceError::NotFound(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn aliases_of_lists_sorted() {
        let mut table = AliasTable::default();
        table.bind(binding("#b:x", "!r1:x", "@u:x")).unwrap();
        table.bind(binding("#a:x", "!r1:x", "@u:x")).unwrap();
        table.bind(binding("#c:x", "!r2:x", "@u:x")).unwrap();

        let aliases: Vec<_> = table
            .aliases_of(&"!r1:x".parse().unwrap())
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(aliases, ["#a:x", "#b:x"]);
    }
}
