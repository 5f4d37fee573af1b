// ABOUTME: Thread-only moderation: redacts top-level chatter in group rooms and escalates repeat offenders
// ABOUTME: Warns by direct message below the threshold, mutes via power level once it is reached

use anyhow::Result;

use crate::config::ModerationConfig;
use crate::infractions::InfractionStore;
use crate::retry::{retry_result, DEFAULT_ATTEMPTS};
use crate::traits::{MessageContent, RoomTransport, TextMessage};

/// Rooms with this many members or fewer are treated as direct chats
const DIRECT_CHAT_MAX_MEMBERS: u64 = 2;

/// What the policy knows about a message when deciding whether to act
#[derive(Debug, Clone)]
pub struct RoomContext {
    pub room_id: String,
    pub room_name: Option<String>,
    pub event_id: String,
    pub sender: String,
    pub member_count: u64,
    pub has_prefix: bool,
    pub is_thread_reply: bool,
}

impl RoomContext {
    /// `prefix` is the command prefix including its trailing space
    pub fn from_message(message: &TextMessage, prefix: &str) -> Self {
        Self {
            room_id: message.room_id.clone(),
            room_name: message.room_name.clone(),
            event_id: message.event_id.clone(),
            sender: message.sender.clone(),
            member_count: message.member_count,
            has_prefix: message.body.starts_with(prefix),
            is_thread_reply: message.is_thread_reply,
        }
    }

    /// Only top-level, non-command messages in group rooms are moderated
    pub fn applies(&self) -> bool {
        self.member_count > DIRECT_CHAT_MAX_MEMBERS && !self.has_prefix && !self.is_thread_reply
    }

    /// Name used in notices; falls back to the room ID
    pub fn display_room(&self) -> &str {
        self.room_name.as_deref().unwrap_or(&self.room_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    NotApplicable,
    /// Sender is a moderator or above
    Exempt,
    /// Bot lacks permission to redact; nothing was changed
    CannotRedact,
    /// Power levels could not be read; nothing was changed
    LookupFailed,
    Warned { attempts: i64 },
    Muted,
}

impl ModerationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationOutcome::NotApplicable => "not_applicable",
            ModerationOutcome::Exempt => "exempt",
            ModerationOutcome::CannotRedact => "cannot_redact",
            ModerationOutcome::LookupFailed => "lookup_failed",
            ModerationOutcome::Warned { .. } => "warned",
            ModerationOutcome::Muted => "muted",
        }
    }
}

pub struct ModerationPolicy {
    config: ModerationConfig,
}

impl ModerationPolicy {
    pub fn new(config: ModerationConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> i64 {
        self.config.threshold
    }

    /// Apply the policy to one message.
    ///
    /// Transport failures are logged: a failed power-level lookup skips
    /// moderation, a failed redaction does not stop the bookkeeping.
    /// Only store failures are returned as errors.
    pub async fn enforce(
        &self,
        ctx: &RoomContext,
        transport: &dyn RoomTransport,
        store: &InfractionStore,
    ) -> Result<ModerationOutcome> {
        let outcome = self.decide(ctx, transport, store).await?;
        crate::metrics::record_moderation(outcome.as_str());
        Ok(outcome)
    }

    async fn decide(
        &self,
        ctx: &RoomContext,
        transport: &dyn RoomTransport,
        store: &InfractionStore,
    ) -> Result<ModerationOutcome> {
        if !ctx.applies() {
            return Ok(ModerationOutcome::NotApplicable);
        }

        let power = match transport.get_power_level(&ctx.room_id, &ctx.sender).await {
            Ok(power) => power,
            Err(e) => {
                tracing::error!(
                    sender = %ctx.sender,
                    room_id = %ctx.room_id,
                    error = %e,
                    "Failed to read sender power level, skipping moderation"
                );
                return Ok(ModerationOutcome::LookupFailed);
            }
        };
        tracing::debug!(sender = %ctx.sender, room_id = %ctx.room_id, power, "Sender power level");

        if power >= self.config.moderator_power_level {
            return Ok(ModerationOutcome::Exempt);
        }

        let can_redact = match transport
            .can_redact(&ctx.room_id, transport.bot_user_id())
            .await
        {
            Ok(can_redact) => can_redact,
            Err(e) => {
                tracing::error!(
                    room_id = %ctx.room_id,
                    error = %e,
                    "Failed to check redaction permission, skipping moderation"
                );
                return Ok(ModerationOutcome::LookupFailed);
            }
        };
        if !can_redact {
            tracing::error!(
                room_id = %ctx.room_id,
                room = %ctx.display_room(),
                "Bot does not have sufficient power to redact others"
            );
            return Ok(ModerationOutcome::CannotRedact);
        }

        let redaction = retry_result("redact", DEFAULT_ATTEMPTS, || {
            transport.redact(&ctx.room_id, &ctx.event_id, &self.config.redaction_reason)
        })
        .await;
        if let Err(e) = &redaction.value {
            tracing::error!(
                room_id = %ctx.room_id,
                event_id = %ctx.event_id,
                attempts = redaction.attempts,
                error = %e,
                "Unable to redact message"
            );
        }

        let attempts = store.get_attempts(&ctx.sender, &ctx.room_id)?;

        if attempts < self.config.threshold {
            let attempts = store.record_infraction(&ctx.sender, &ctx.room_id)?;
            tracing::info!(
                sender = %ctx.sender,
                room_id = %ctx.room_id,
                attempts,
                "Warned sender for top-level message"
            );
            self.notify(transport, &ctx.sender, warning_notice(attempts, ctx.display_room()))
                .await;
            return Ok(ModerationOutcome::Warned { attempts });
        }

        store.clear(&ctx.sender, &ctx.room_id)?;
        if let Err(e) = transport
            .set_power_level(&ctx.room_id, &ctx.sender, self.config.mute_power_level)
            .await
        {
            tracing::error!(
                sender = %ctx.sender,
                room_id = %ctx.room_id,
                error = %e,
                "Failed to mute sender"
            );
        }
        tracing::info!(sender = %ctx.sender, room_id = %ctx.room_id, "Sender muted");
        self.notify(
            transport,
            &ctx.sender,
            mute_notice(self.config.threshold, ctx.display_room()),
        )
        .await;

        Ok(ModerationOutcome::Muted)
    }

    async fn notify(&self, transport: &dyn RoomTransport, user_id: &str, text: String) {
        if let Err(e) = transport
            .send_direct_message(user_id, MessageContent::markdown(text))
            .await
        {
            tracing::warn!(user_id, error = %e, "Failed to send moderation notice");
        }
    }
}

fn warning_notice(attempts: i64, room: &str) -> String {
    format!(
        "Your comment has been deleted {} times in {} discussion due to being improperly sent. Please reply in threads.",
        attempts, room
    )
}

fn mute_notice(threshold: i64, room: &str) -> String {
    format!(
        "You have made more than {} improper comments in {} discussion. Please seek help from the group admin.",
        threshold, room
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RoomContext {
        RoomContext {
            room_id: "!room:example.org".to_string(),
            room_name: None,
            event_id: "$msg".to_string(),
            sender: "@alice:example.org".to_string(),
            member_count: 5,
            has_prefix: false,
            is_thread_reply: false,
        }
    }

    #[test]
    fn test_gate_requires_group_room() {
        let mut ctx = context();
        assert!(ctx.applies());
        ctx.member_count = 2;
        assert!(!ctx.applies());
    }

    #[test]
    fn test_gate_skips_commands_and_threads() {
        let mut ctx = context();
        ctx.has_prefix = true;
        assert!(!ctx.applies());

        let mut ctx = context();
        ctx.is_thread_reply = true;
        assert!(!ctx.applies());
    }

    #[test]
    fn test_from_message_detects_prefix() {
        let message = TextMessage {
            room_id: "!room:example.org".to_string(),
            room_name: Some("General".to_string()),
            event_id: "$msg".to_string(),
            sender: "@alice:example.org".to_string(),
            body: "!c echo hi".to_string(),
            member_count: 4,
            is_thread_reply: false,
        };
        let ctx = RoomContext::from_message(&message, "!c ");
        assert!(ctx.has_prefix);
        assert_eq!(ctx.display_room(), "General");

        // Prefix without its trailing space is plain text
        let message = TextMessage {
            body: "!cecho".to_string(),
            ..message
        };
        assert!(!RoomContext::from_message(&message, "!c ").has_prefix);
    }

    #[test]
    fn test_notices_name_count_and_room() {
        let warning = warning_notice(3, "General");
        assert!(warning.contains("3 times"));
        assert!(warning.contains("General"));
        assert!(mute_notice(3, "General").contains("group admin"));
    }
}
