// ABOUTME: Conversion of matrix-sdk sync events into transport-neutral inbound events
// ABOUTME: Only plain text messages are commands; notices and media are ignored

use matrix_sdk::ruma::events::{
    reaction::OriginalSyncReactionEvent,
    room::{
        encrypted::OriginalSyncRoomEncryptedEvent,
        member::{MembershipState, StrippedRoomMemberEvent},
        message::{MessageType, OriginalSyncRoomMessageEvent, Relation, RoomMessageEventContent},
    },
};
use warden_core::{InboundEvent, InviteEvent, ReactionEvent, TextMessage, UndecryptableEvent};

/// Message-like event types that have a dedicated converter
const CONVERTED_TYPES: &[&str] = &["m.room.message", "m.reaction", "m.room.encrypted"];

/// What the converters need to know about the room an event arrived in
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub name: Option<String>,
    pub member_count: u64,
}

/// Body of an `m.text` message
pub fn text_body(content: &RoomMessageEventContent) -> Option<&str> {
    match &content.msgtype {
        MessageType::Text(text) => Some(text.body.as_str()),
        _ => None,
    }
}

pub fn is_thread_reply(content: &RoomMessageEventContent) -> bool {
    matches!(content.relates_to, Some(Relation::Thread(_)))
}

pub fn text_message(room: &RoomSnapshot, event: &OriginalSyncRoomMessageEvent) -> Option<TextMessage> {
    let body = text_body(&event.content)?;
    Some(TextMessage {
        room_id: room.room_id.clone(),
        room_name: room.name.clone(),
        event_id: event.event_id.to_string(),
        sender: event.sender.to_string(),
        body: body.to_string(),
        member_count: room.member_count,
        is_thread_reply: is_thread_reply(&event.content),
    })
}

/// Invites only; other membership changes are not dispatched
pub fn invite_event(room_id: &str, event: &StrippedRoomMemberEvent) -> Option<InviteEvent> {
    if event.content.membership != MembershipState::Invite {
        return None;
    }
    Some(InviteEvent {
        room_id: room_id.to_string(),
        sender: event.sender.to_string(),
        invitee: event.state_key.to_string(),
    })
}

pub fn reaction_event(room_id: &str, event: &OriginalSyncReactionEvent) -> ReactionEvent {
    ReactionEvent {
        room_id: room_id.to_string(),
        event_id: event.event_id.to_string(),
        sender: event.sender.to_string(),
        reacted_to: event.content.relates_to.event_id.to_string(),
        key: event.content.relates_to.key.clone(),
    }
}

pub fn undecryptable_event(
    room_id: &str,
    event: &OriginalSyncRoomEncryptedEvent,
) -> UndecryptableEvent {
    UndecryptableEvent {
        room_id: room_id.to_string(),
        event_id: event.event_id.to_string(),
        sender: event.sender.to_string(),
    }
}

/// Any other message-like event, passed on so the dispatcher can log it
pub fn unknown_event(room_id: &str, sender: &str, event_type: &str) -> Option<InboundEvent> {
    if CONVERTED_TYPES.contains(&event_type) {
        return None;
    }
    Some(InboundEvent::Unknown {
        room_id: room_id.to_string(),
        sender: sender.to_string(),
        event_type: event_type.to_string(),
    })
}
