//! Target version validation

use crate::config::UpgradeConfig;
use crate::error::{InputError, UpgradeError};
use room_model::{EventFormat, RoomVersionId};
use std::collections::BTreeSet;

/// Accepts versions that are both enabled and producible
#[derive(Debug, Clone)]
pub struct VersionValidator {
    enabled: BTreeSet<RoomVersionId>,
}

impl VersionValidator {
    /// Build from configuration
    #[must_use]
    pub fn new(config: &UpgradeConfig) -> Self {
        Self {
            enabled: config.supported_versions.iter().cloned().collect(),
        }
    }

    /// Check `version`; no state is read
    ///
    /// # Errors
    /// Returns [`InputError::UnsupportedRoomVersion`] if the version has no
    /// known event format or is not enabled.
    pub fn validate(&self, version: &RoomVersionId) -> Result<EventFormat, UpgradeError> {
        let format = version
            .event_format()
            .map_err(|e| InputError::UnsupportedRoomVersion(e.0))?;
        if !self.enabled.contains(version) {
            return Err(InputError::UnsupportedRoomVersion(version.to_string()).into());
        }
        Ok(format)
    }

    /// Versions that pass [`validate`](Self::validate)
    pub fn accepted(&self) -> impl Iterator<Item = &RoomVersionId> {
        self.enabled.iter().filter(|v| v.is_known())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;

    #[test]
    fn known_and_enabled_versions_pass() {
        let validator = VersionValidator::new(&UpgradeConfig::default());
        assert_eq!(
            validator.validate(&RoomVersionId::from("10")).unwrap(),
            EventFormat::V3
        );
    }

    #[test]
    fn unknown_version_rejected() {
        let validator = VersionValidator::new(&UpgradeConfig::default());
        let err = validator.validate(&RoomVersionId::from("zz")).unwrap_err();
        assert!(matches!(
            err,
            UpgradeError::InvalidInput(InputError::UnsupportedRoomVersion(ref v)) if v == "zz"
        ));
    }

    #[test]
    fn disabled_version_rejected() {
        let config = UpgradeConfig::default().with_supported_versions(["10", "11", "bogus"]);
        let validator = VersionValidator::new(&config);

        assert!(validator.validate(&RoomVersionId::from("9")).is_err());
        assert!(validator.validate(&RoomVersionId::from("bogus")).is_err());
        let accepted: Vec<_> = validator.accepted().map(RoomVersionId::as_str).collect();
        assert_eq!(accepted, ["10", "11"]);
    }
}
