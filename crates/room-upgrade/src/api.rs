//! Client-facing request and response shapes
//!
//! `POST /rooms/{room_id}/upgrade` with `{"new_version": "<v>"}` answers
//! `{"replacement_room": "<id>"}` or `{"errcode": .., "error": ..}`.

use crate::error::{InputError, UpgradeError};
use crate::upgrader::RoomUpgrader;
use room_model::{RoomId, RoomVersionId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upgrade request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRoomRequest {
    /// Target protocol version
    pub new_version: RoomVersionId,
}

impl UpgradeRoomRequest {
    /// Decode a raw request body
    ///
    /// # Errors
    /// - [`InputError::NotJson`] if `body` is not JSON at all
    /// - [`InputError::BadJson`] if it lacks a string `new_version`
    pub fn from_json(body: &[u8]) -> Result<Self, InputError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| InputError::NotJson(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| InputError::BadJson(e.to_string()))
    }
}

/// Success body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRoomResponse {
    /// Successor room
    pub replacement_room: RoomId,
}

/// Error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Protocol error code
    pub errcode: String,
    /// Human-readable message
    pub error: String,
}

impl From<&UpgradeError> for ErrorBody {
    fn from(e: &UpgradeError) -> Self {
        Self {
            errcode: e.errcode().to_string(),
            error: e.client_message(),
        }
    }
}

/// Status and JSON body handed back to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientResponse {
    /// HTTP status
    pub status: u16,
    /// JSON body
    pub body: Value,
}

impl ClientResponse {
    /// 200 with the successor room id
    #[must_use]
    pub fn ok(replacement_room: RoomId) -> Self {
        Self {
            status: 200,
            body: serde_json::json!(UpgradeRoomResponse { replacement_room }),
        }
    }

    /// Error status and body
    #[must_use]
    pub fn error(e: &UpgradeError) -> Self {
        Self {
            status: e.status_code(),
            body: serde_json::json!(ErrorBody::from(e)),
        }
    }

    /// Whether the status is 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Decode `body`, run the upgrade and shape the reply
pub async fn handle_upgrade(
    upgrader: &RoomUpgrader,
    room_id: &RoomId,
    requester: &UserId,
    body: &[u8],
) -> ClientResponse {
    let request = match UpgradeRoomRequest::from_json(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::info!(%room_id, %requester, error = %e, "rejecting malformed upgrade request");
            return ClientResponse::error(&UpgradeError::from(e));
        }
    };

    match upgrader.upgrade(room_id, requester, &request.new_version).await {
        Ok(outcome) => ClientResponse::ok(outcome.replacement_room),
        Err(e) => ClientResponse::error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::CreateRoomError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_new_version() {
        let req = UpgradeRoomRequest::from_json(br#"{"new_version": "10"}"#).unwrap();
        assert_eq!(req.new_version.as_str(), "10");
    }

    #[test]
    fn not_json_and_bad_json_differ() {
        assert!(matches!(
            UpgradeRoomRequest::from_json(b"{nope"),
            Err(InputError::NotJson(_))
        ));
        assert!(matches!(
            UpgradeRoomRequest::from_json(br#"{"new_version": 10}"#),
            Err(InputError::BadJson(_))
        ));
        assert!(matches!(
            UpgradeRoomRequest::from_json(b"{}"),
            Err(InputError::BadJson(_))
        ));
    }

    #[test]
    fn error_response_shape() {
        let resp = ClientResponse::error(&UpgradeError::from(InputError::NotJson("x".into())));
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body["errcode"], "M_NOT_JSON");

        let resp = ClientResponse::error(&UpgradeError::Forbidden(
            crate::authz::FORBIDDEN_MESSAGE.into(),
        ));
        assert_eq!(
            resp.body,
            json!({"errcode": "M_FORBIDDEN", "error": "User is not allowed to set state event"})
        );
        assert!(!resp.is_success());
    }

    #[test]
    fn create_errors_pass_through() {
        let resp = ClientResponse::error(&UpgradeError::from(CreateRoomError {
            status: 409,
            errcode: "M_ROOM_IN_USE".into(),
            error: "Room ID already exists".into(),
        }));
        assert_eq!(resp.status, 409);
        assert_eq!(
            resp.body,
            json!({"errcode": "M_ROOM_IN_USE", "error": "Room ID already exists"})
        );
    }

    #[test]
    fn ok_response_shape() {
        let resp = ClientResponse::ok("!new:x".parse().unwrap());
        assert!(resp.is_success());
        assert_eq!(resp.body, json!({"replacement_room": "!new:x"}));
    }
}
