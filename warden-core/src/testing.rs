// ABOUTME: In-memory RoomTransport that records every call for assertions
// ABOUTME: Lets dispatcher, moderation, and command tests run without a homeserver

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::traits::{MessageContent, RoomTransport};

/// A call captured by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    RoomMessage {
        room_id: String,
        content: MessageContent,
    },
    DirectMessage {
        user_id: String,
        content: MessageContent,
    },
    React {
        room_id: String,
        event_id: String,
        key: String,
    },
    Redact {
        room_id: String,
        event_id: String,
        reason: String,
    },
    GetEvent {
        room_id: String,
        event_id: String,
    },
    Join {
        room_id: String,
    },
    SetPowerLevel {
        room_id: String,
        user_id: String,
        level: i64,
    },
}

#[derive(Default)]
struct MockState {
    calls: Vec<TransportCall>,
    power_levels: HashMap<(String, String), i64>,
    event_senders: HashMap<String, String>,
    redact_failures: u32,
    join_failures: u32,
    send_failures: u32,
    power_lookup_fails: bool,
    can_redact: bool,
}

/// Scriptable transport for tests
#[derive(Clone)]
pub struct MockTransport {
    bot_user_id: String,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(bot_user_id: &str) -> Self {
        Self {
            bot_user_id: bot_user_id.to_string(),
            state: Arc::new(Mutex::new(MockState {
                can_redact: true,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn with_power_level(self, room_id: &str, user_id: &str, level: i64) -> Self {
        self.state()
            .power_levels
            .insert((room_id.to_string(), user_id.to_string()), level);
        self
    }

    /// Make `get_event_sender` resolve `event_id` to `sender`
    pub fn with_event(self, event_id: &str, sender: &str) -> Self {
        self.state()
            .event_senders
            .insert(event_id.to_string(), sender.to_string());
        self
    }

    pub fn with_can_redact(self, can_redact: bool) -> Self {
        self.state().can_redact = can_redact;
        self
    }

    /// Fail the next `n` redactions
    pub fn failing_redactions(self, n: u32) -> Self {
        self.state().redact_failures = n;
        self
    }

    /// Fail the next `n` joins
    pub fn failing_joins(self, n: u32) -> Self {
        self.state().join_failures = n;
        self
    }

    /// Fail the next `n` room messages
    pub fn failing_sends(self, n: u32) -> Self {
        self.state().send_failures = n;
        self
    }

    /// Make every power-level read fail
    pub fn failing_power_lookups(self) -> Self {
        self.state().power_lookup_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    pub fn clear(&self) {
        self.state().calls.clear();
    }

    pub fn room_messages(&self) -> Vec<MessageContent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::RoomMessage { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn direct_messages(&self) -> Vec<(String, MessageContent)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::DirectMessage { user_id, content } => Some((user_id, content)),
                _ => None,
            })
            .collect()
    }

    pub fn reactions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::React { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn redaction_attempts(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Redact { .. }))
    }

    pub fn join_attempts(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Join { .. }))
    }

    /// Last plain-text body sent to a room
    pub fn last_room_text(&self) -> Option<String> {
        self.room_messages().last().map(|m| m.plain.clone())
    }
}

#[async_trait]
impl RoomTransport for MockTransport {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn send_room_message(&self, room_id: &str, content: MessageContent) -> Result<()> {
        let mut state = self.state();
        if state.send_failures > 0 {
            state.send_failures -= 1;
            anyhow::bail!("M_LIMIT_EXCEEDED: too many requests");
        }
        state.calls.push(TransportCall::RoomMessage {
            room_id: room_id.to_string(),
            content,
        });
        Ok(())
    }

    async fn send_direct_message(&self, user_id: &str, content: MessageContent) -> Result<()> {
        self.state().calls.push(TransportCall::DirectMessage {
            user_id: user_id.to_string(),
            content,
        });
        Ok(())
    }

    async fn react(&self, room_id: &str, event_id: &str, key: &str) -> Result<()> {
        self.state().calls.push(TransportCall::React {
            room_id: room_id.to_string(),
            event_id: event_id.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    async fn redact(&self, room_id: &str, event_id: &str, reason: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(TransportCall::Redact {
            room_id: room_id.to_string(),
            event_id: event_id.to_string(),
            reason: reason.to_string(),
        });
        if state.redact_failures > 0 {
            state.redact_failures -= 1;
            anyhow::bail!("M_FORBIDDEN: redaction rejected");
        }
        Ok(())
    }

    async fn get_event_sender(&self, room_id: &str, event_id: &str) -> Result<String> {
        let mut state = self.state();
        state.calls.push(TransportCall::GetEvent {
            room_id: room_id.to_string(),
            event_id: event_id.to_string(),
        });
        state
            .event_senders
            .get(event_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("M_NOT_FOUND: event {} not found", event_id))
    }

    async fn join_room(&self, room_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(TransportCall::Join {
            room_id: room_id.to_string(),
        });
        if state.join_failures > 0 {
            state.join_failures -= 1;
            anyhow::bail!("M_UNKNOWN: join failed");
        }
        Ok(())
    }

    async fn get_power_level(&self, room_id: &str, user_id: &str) -> Result<i64> {
        let state = self.state();
        if state.power_lookup_fails {
            anyhow::bail!("M_UNKNOWN: state fetch failed");
        }
        Ok(state
            .power_levels
            .get(&(room_id.to_string(), user_id.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn set_power_level(&self, room_id: &str, user_id: &str, level: i64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(TransportCall::SetPowerLevel {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            level,
        });
        state
            .power_levels
            .insert((room_id.to_string(), user_id.to_string()), level);
        Ok(())
    }

    async fn can_redact(&self, _room_id: &str, _user_id: &str) -> Result<bool> {
        Ok(self.state().can_redact)
    }
}
