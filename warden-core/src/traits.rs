// ABOUTME: Transport trait the dispatcher needs from a chat platform, plus inbound event types
// ABOUTME: Keeps moderation and command handling testable without a live homeserver

use anyhow::Result;
use async_trait::async_trait;

use crate::utils::markdown_to_html;

// =============================================================================
// Message Content
// =============================================================================

/// Content of an outbound notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub plain: String,
    pub html: Option<String>,
    /// Event this message replies to, if any
    pub reply_to: Option<String>,
}

impl MessageContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain: text.into(),
            html: None,
            reply_to: None,
        }
    }

    /// Plain body plus an HTML rendering of it as markdown
    pub fn markdown(text: impl Into<String>) -> Self {
        let plain = text.into();
        let html = markdown_to_html(&plain);
        Self {
            plain,
            html: Some(html),
            reply_to: None,
        }
    }

    pub fn in_reply_to(mut self, event_id: impl Into<String>) -> Self {
        self.reply_to = Some(event_id.into());
        self
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// A text message as seen by the dispatcher
#[derive(Debug, Clone)]
pub struct TextMessage {
    pub room_id: String,
    pub room_name: Option<String>,
    pub event_id: String,
    pub sender: String,
    pub body: String,
    /// Joined plus invited members at the time the event was received
    pub member_count: u64,
    /// True when the message belongs to a thread
    pub is_thread_reply: bool,
}

/// Membership invite; broadcast for every member, not only the bot
#[derive(Debug, Clone)]
pub struct InviteEvent {
    pub room_id: String,
    pub sender: String,
    /// The user being invited
    pub invitee: String,
}

/// Annotation (reaction) to an earlier event
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
    pub reacted_to: String,
    pub key: String,
}

/// An encrypted event the client could not decrypt
#[derive(Debug, Clone)]
pub struct UndecryptableEvent {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub enum InboundEvent {
    Text(TextMessage),
    Invite(InviteEvent),
    Reaction(ReactionEvent),
    Undecryptable(UndecryptableEvent),
    Unknown {
        room_id: String,
        sender: String,
        event_type: String,
    },
}

impl InboundEvent {
    pub fn sender(&self) -> &str {
        match self {
            InboundEvent::Text(ev) => &ev.sender,
            InboundEvent::Invite(ev) => &ev.sender,
            InboundEvent::Reaction(ev) => &ev.sender,
            InboundEvent::Undecryptable(ev) => &ev.sender,
            InboundEvent::Unknown { sender, .. } => sender,
        }
    }

    pub fn room_id(&self) -> &str {
        match self {
            InboundEvent::Text(ev) => &ev.room_id,
            InboundEvent::Invite(ev) => &ev.room_id,
            InboundEvent::Reaction(ev) => &ev.room_id,
            InboundEvent::Undecryptable(ev) => &ev.room_id,
            InboundEvent::Unknown { room_id, .. } => room_id,
        }
    }

    /// Short label used for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Text(_) => "text",
            InboundEvent::Invite(_) => "invite",
            InboundEvent::Reaction(_) => "reaction",
            InboundEvent::Undecryptable(_) => "undecryptable",
            InboundEvent::Unknown { .. } => "unknown",
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Operations the dispatcher performs against the homeserver.
///
/// Every call is a network round-trip. Implementations report failures as
/// `Err`; retrying is the caller's decision.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// The bot's own user ID
    fn bot_user_id(&self) -> &str;

    /// Check if a user ID is the bot itself
    fn is_self(&self, user_id: &str) -> bool {
        user_id == self.bot_user_id()
    }

    async fn send_room_message(&self, room_id: &str, content: MessageContent) -> Result<()>;

    /// Send to the user's direct room, creating one if needed
    async fn send_direct_message(&self, user_id: &str, content: MessageContent) -> Result<()>;

    async fn react(&self, room_id: &str, event_id: &str, key: &str) -> Result<()>;

    async fn redact(&self, room_id: &str, event_id: &str, reason: &str) -> Result<()>;

    /// Sender of an earlier event; errors if the event cannot be fetched
    async fn get_event_sender(&self, room_id: &str, event_id: &str) -> Result<String>;

    async fn join_room(&self, room_id: &str) -> Result<()>;

    async fn get_power_level(&self, room_id: &str, user_id: &str) -> Result<i64>;

    async fn set_power_level(&self, room_id: &str, user_id: &str, level: i64) -> Result<()>;

    /// Whether `user_id` may redact events sent by others in the room
    async fn can_redact(&self, room_id: &str, user_id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_content_has_html() {
        let content = MessageContent::markdown("use `help`");
        assert_eq!(content.plain, "use `help`");
        assert!(content.html.unwrap().contains("<code>help</code>"));
    }

    #[test]
    fn test_in_reply_to_sets_relation() {
        let content = MessageContent::plain("ack").in_reply_to("$event");
        assert_eq!(content.reply_to.as_deref(), Some("$event"));
        assert!(content.html.is_none());
    }

    #[test]
    fn test_inbound_event_accessors() {
        let event = InboundEvent::Invite(InviteEvent {
            room_id: "!room:example.org".to_string(),
            sender: "@alice:example.org".to_string(),
            invitee: "@warden:example.org".to_string(),
        });
        assert_eq!(event.sender(), "@alice:example.org");
        assert_eq!(event.room_id(), "!room:example.org");
        assert_eq!(event.kind(), "invite");
    }
}
