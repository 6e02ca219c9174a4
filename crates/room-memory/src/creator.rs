//! Initial events of a created room
//!
//! Turns a [`CreateRoomRequest`] into the ordered drafts that make up a new
//! room: create, creator membership, power levels, join rules, history
//! visibility, guest access, name, topic, then the opaque initial state.

use room_model::{
    event_type, EventDraft, GuestAccess, HistoryVisibility, JoinRule, Membership, PowerLevels,
    UserId,
};
use room_upgrade::{CreateRoomError, CreateRoomRequest};
use serde_json::{json, Value};

/// Join rule when none is requested
pub const DEFAULT_JOIN_RULE: JoinRule = JoinRule::Invite;

/// History visibility when none is requested
pub const DEFAULT_HISTORY_VISIBILITY: HistoryVisibility = HistoryVisibility::Shared;

/// Drafts for every initial event, in commit order
///
/// # Errors
/// Returns a 400 `M_BAD_JSON` [`CreateRoomError`] if the creation content
/// is not a JSON object.
pub fn creation_drafts(
    request: &CreateRoomRequest,
    creator: &UserId,
) -> Result<Vec<EventDraft>, CreateRoomError> {
    let Value::Object(mut create) = request.creation_content.clone() else {
        return Err(CreateRoomError::bad_request(
            "M_BAD_JSON",
            "creation_content must be an object",
        ));
    };
    create.insert("creator".to_string(), json!(creator));
    create.insert("room_version".to_string(), json!(request.room_version));

    let power_levels = match &request.power_level_content_override {
        Some(content) => content.clone(),
        None => serde_json::to_value(PowerLevels::for_creator(creator))
            .map_err(|e| CreateRoomError::internal(e.to_string()))?,
    };
    let guest_access = if request.guest_can_join {
        GuestAccess::CanJoin
    } else {
        GuestAccess::Forbidden
    };

    let state = |ty: &str, key: &str, content: Value| {
        EventDraft::state(request.room_id.clone(), creator.clone(), ty, key, content)
    };

    let mut drafts = vec![
        state(event_type::CREATE, "", Value::Object(create)),
        state(
            event_type::MEMBER,
            creator.as_str(),
            json!({ "membership": Membership::Join }),
        ),
        state(event_type::POWER_LEVELS, "", power_levels),
        state(
            event_type::JOIN_RULES,
            "",
            json!({ "join_rule": request.join_rule.unwrap_or(DEFAULT_JOIN_RULE) }),
        ),
        state(
            event_type::HISTORY_VISIBILITY,
            "",
            json!({
                "history_visibility": request
                    .history_visibility
                    .unwrap_or(DEFAULT_HISTORY_VISIBILITY)
            }),
        ),
        state(
            event_type::GUEST_ACCESS,
            "",
            json!({ "guest_access": guest_access.as_str() }),
        ),
    ];

    if let Some(name) = &request.name {
        drafts.push(state(event_type::NAME, "", json!({ "name": name })));
    }
    if let Some(topic) = &request.topic {
        drafts.push(state(event_type::TOPIC, "", json!({ "topic": topic })));
    }
    for entry in &request.initial_state {
        drafts.push(state(
            &entry.event_type,
            &entry.state_key,
            entry.content.clone(),
        ));
    }

    Ok(drafts)
}
