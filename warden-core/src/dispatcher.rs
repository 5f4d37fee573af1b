// ABOUTME: Per-event entry point deciding between moderation, command routing, reactions and invites
// ABOUTME: Platform-agnostic; talks to the homeserver only through RoomTransport

use anyhow::Result;
use std::sync::Arc;
use tracing::Instrument;

use crate::{
    commands::{CommandContext, CommandRouter},
    config::Config,
    infractions::InfractionStore,
    moderation::{ModerationPolicy, RoomContext},
    retry::{retry_result, DEFAULT_ATTEMPTS},
    traits::{
        InboundEvent, InviteEvent, MessageContent, ReactionEvent, RoomTransport, TextMessage,
        UndecryptableEvent,
    },
    utils::make_pill,
};

/// Reaction placed on events the bot could not decrypt
pub const UNDECRYPTABLE_REACTION: &str = "❌ 🔐";

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// Not for us: own events, invites for others, reactions to others' events
    Ignored,
}

pub struct EventDispatcher {
    transport: Arc<dyn RoomTransport>,
    store: InfractionStore,
    policy: ModerationPolicy,
    router: CommandRouter,
    command_prefix: String,
}

impl EventDispatcher {
    pub fn new(
        transport: Arc<dyn RoomTransport>,
        store: InfractionStore,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            store,
            policy: ModerationPolicy::new(config.moderation.clone()),
            router: CommandRouter::new(config.commands.clone())?,
            command_prefix: config.command_prefix(),
        })
    }

    pub fn store(&self) -> &InfractionStore {
        &self.store
    }

    /// Handle any inbound event
    pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchOutcome> {
        let span = tracing::info_span!(
            "event",
            kind = event.kind(),
            room_id = %event.room_id(),
            sender = %event.sender()
        );

        async move {
            crate::metrics::record_event(event.kind());

            if self.transport.is_self(event.sender()) {
                tracing::trace!("Ignoring own event");
                return Ok(DispatchOutcome::Ignored);
            }

            match event {
                InboundEvent::Text(message) => self.on_message_event(message).await,
                InboundEvent::Invite(invite) => Ok(self.on_invite_event(invite).await),
                InboundEvent::Reaction(reaction) => self.on_reaction_event(reaction).await,
                InboundEvent::Undecryptable(event) => self.on_undecryptable_event(event).await,
                InboundEvent::Unknown { event_type, .. } => {
                    tracing::debug!(event_type = %event_type, "Ignoring unhandled event type");
                    Ok(DispatchOutcome::Ignored)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Moderate (when applicable) and then route the message as a command.
    ///
    /// Routing happens whether or not the message carried the prefix, so a
    /// moderated message is also answered by the router.
    pub async fn on_message_event(&self, message: TextMessage) -> Result<DispatchOutcome> {
        if self.transport.is_self(&message.sender) {
            return Ok(DispatchOutcome::Ignored);
        }

        tracing::debug!(
            room = %message.room_name.as_deref().unwrap_or(&message.room_id),
            event_id = %message.event_id,
            member_count = message.member_count,
            thread = message.is_thread_reply,
            "Text message received"
        );

        let ctx = RoomContext::from_message(&message, &self.command_prefix);
        if ctx.applies() {
            let outcome = self.policy.enforce(&ctx, self.transport.as_ref(), &self.store).await?;
            tracing::debug!(outcome = outcome.as_str(), "Moderation decision");
        }

        let line = message
            .body
            .strip_prefix(self.command_prefix.as_str())
            .unwrap_or(&message.body);

        let command_ctx = CommandContext {
            room_id: &message.room_id,
            event_id: &message.event_id,
            sender: &message.sender,
        };
        self.router
            .route(line, &command_ctx, self.transport.as_ref())
            .await?;

        Ok(DispatchOutcome::Handled)
    }

    /// Join rooms the bot is invited to. Join failures are logged, never returned.
    pub async fn on_invite_event(&self, invite: InviteEvent) -> DispatchOutcome {
        if !self.transport.is_self(&invite.invitee) {
            return DispatchOutcome::Ignored;
        }
        tracing::info!(room_id = %invite.room_id, inviter = %invite.sender, "Invited to room");

        let outcome = retry_result("join", DEFAULT_ATTEMPTS, || {
            self.transport.join_room(&invite.room_id)
        })
        .await;

        match outcome.value {
            Ok(()) => {
                tracing::info!(room_id = %invite.room_id, attempts = outcome.attempts, "Joined room");
            }
            Err(e) => {
                tracing::error!(
                    room_id = %invite.room_id,
                    attempts = outcome.attempts,
                    error = %e,
                    "Unable to join room"
                );
            }
        }

        DispatchOutcome::Handled
    }

    /// Acknowledge reactions to the bot's own messages
    pub async fn on_reaction_event(&self, reaction: ReactionEvent) -> Result<DispatchOutcome> {
        if self.transport.is_self(&reaction.sender) {
            return Ok(DispatchOutcome::Ignored);
        }

        let original_sender = match self
            .transport
            .get_event_sender(&reaction.room_id, &reaction.reacted_to)
            .await
        {
            Ok(sender) => sender,
            Err(e) => {
                tracing::warn!(
                    reacted_to = %reaction.reacted_to,
                    error = %e,
                    "Failed to fetch reacted-to event"
                );
                return Ok(DispatchOutcome::Ignored);
            }
        };

        if !self.transport.is_self(&original_sender) {
            return Ok(DispatchOutcome::Ignored);
        }

        let text = format!(
            "{} reacted to this event with `{}`!",
            make_pill(&reaction.sender, None),
            reaction.key
        );
        let content = MessageContent::markdown(text).in_reply_to(reaction.reacted_to.clone());
        self.transport
            .send_room_message(&reaction.room_id, content)
            .await?;

        Ok(DispatchOutcome::Handled)
    }

    pub async fn on_undecryptable_event(
        &self,
        event: UndecryptableEvent,
    ) -> Result<DispatchOutcome> {
        tracing::error!(
            event_id = %event.event_id,
            sender = %event.sender,
            "Failed to decrypt event. If this keeps happening, the bot's device may \
             have changed; remove the session store and log in again with a fresh device"
        );

        self.transport
            .react(&event.room_id, &event.event_id, UNDECRYPTABLE_REACTION)
            .await?;

        Ok(DispatchOutcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    const BOT: &str = "@warden:example.org";

    fn dispatcher(transport: &MockTransport) -> EventDispatcher {
        EventDispatcher::new(
            Arc::new(transport.clone()),
            InfractionStore::in_memory().unwrap(),
            &Config::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let transport = MockTransport::new(BOT);
        let outcome = dispatcher(&transport)
            .dispatch(InboundEvent::Unknown {
                room_id: "!r:example.org".to_string(),
                sender: "@alice:example.org".to_string(),
                event_type: "m.room.topic".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invite_for_someone_else_is_ignored() {
        let transport = MockTransport::new(BOT);
        let outcome = dispatcher(&transport)
            .on_invite_event(InviteEvent {
                room_id: "!r:example.org".to_string(),
                sender: "@alice:example.org".to_string(),
                invitee: "@bob:example.org".to_string(),
            })
            .await;
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(transport.join_attempts(), 0);
    }
}
