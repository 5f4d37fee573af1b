// ABOUTME: Matrix implementation of RoomTransport on top of matrix-sdk
// ABOUTME: Registers SDK event handlers that feed one ordered channel of inbound events

pub mod events;

use anyhow::{Context, Result};
use async_trait::async_trait;
use matrix_sdk::{
    room::Room,
    ruma::{
        events::{
            reaction::{OriginalSyncReactionEvent, ReactionEventContent},
            AnySyncMessageLikeEvent,
            relation::{Annotation, InReplyTo},
            room::{
                encrypted::OriginalSyncRoomEncryptedEvent,
                member::StrippedRoomMemberEvent,
                message::{OriginalSyncRoomMessageEvent, Relation, RoomMessageEventContent},
            },
        },
        Int, OwnedEventId, OwnedRoomId, OwnedUserId,
    },
    Client,
};
use tokio::sync::mpsc;
use warden_core::{InboundEvent, MessageContent, RoomTransport};

use events::RoomSnapshot;

/// Events buffered between the SDK handlers and the dispatch worker
const EVENT_BUFFER: usize = 256;

pub struct MatrixTransport {
    client: Client,
    /// Cached at construction so `bot_user_id` can hand out a borrow
    user_id: String,
}

impl MatrixTransport {
    /// Create a transport for a logged-in client
    pub fn new(client: Client) -> Result<Self> {
        let user_id = client
            .user_id()
            .context("Matrix client is not logged in")?
            .to_string();
        Ok(Self { client, user_id })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn room(&self, room_id: &str) -> Result<Room> {
        let room_id: OwnedRoomId = room_id.parse().context("Invalid room ID")?;
        self.client
            .get_room(&room_id)
            .with_context(|| format!("Room {} not found", room_id))
    }

    /// Register SDK handlers and return the receiving end of the event channel.
    /// Handlers only convert and enqueue; all processing happens on the receiver side.
    pub fn setup_event_stream(&self) -> mpsc::Receiver<InboundEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let sender = tx.clone();
        self.client.add_event_handler(
            move |event: OriginalSyncRoomMessageEvent, room: Room| {
                let tx = sender.clone();
                async move {
                    let snapshot = RoomSnapshot {
                        room_id: room.room_id().to_string(),
                        name: room.name(),
                        member_count: room.active_members_count(),
                    };
                    if let Some(message) = events::text_message(&snapshot, &event) {
                        forward(&tx, InboundEvent::Text(message)).await;
                    }
                }
            },
        );

        let sender = tx.clone();
        self.client.add_event_handler(
            move |event: StrippedRoomMemberEvent, room: Room| {
                let tx = sender.clone();
                async move {
                    if let Some(invite) = events::invite_event(room.room_id().as_str(), &event) {
                        forward(&tx, InboundEvent::Invite(invite)).await;
                    }
                }
            },
        );

        let sender = tx.clone();
        self.client.add_event_handler(
            move |event: OriginalSyncReactionEvent, room: Room| {
                let tx = sender.clone();
                async move {
                    let reaction = events::reaction_event(room.room_id().as_str(), &event);
                    forward(&tx, InboundEvent::Reaction(reaction)).await;
                }
            },
        );

        let sender = tx.clone();
        self.client.add_event_handler(
            move |event: OriginalSyncRoomEncryptedEvent, room: Room| {
                let tx = sender.clone();
                async move {
                    let event = events::undecryptable_event(room.room_id().as_str(), &event);
                    forward(&tx, InboundEvent::Undecryptable(event)).await;
                }
            },
        );

        self.client.add_event_handler(
            move |event: AnySyncMessageLikeEvent, room: Room| {
                let tx = tx.clone();
                async move {
                    let event_type = event.event_type().to_string();
                    if let Some(event) = events::unknown_event(
                        room.room_id().as_str(),
                        event.sender().as_str(),
                        &event_type,
                    ) {
                        forward(&tx, event).await;
                    }
                }
            },
        );

        rx
    }
}

async fn forward(tx: &mpsc::Sender<InboundEvent>, event: InboundEvent) {
    if tx.send(event).await.is_err() {
        tracing::warn!("Event stream receiver dropped");
    }
}

/// Build a notice, formatted when HTML is present and threaded as a reply when asked
fn notice_content(content: MessageContent) -> Result<RoomMessageEventContent> {
    let mut notice = match content.html {
        Some(html) => RoomMessageEventContent::notice_html(content.plain, html),
        None => RoomMessageEventContent::notice_plain(content.plain),
    };
    if let Some(reply_to) = content.reply_to {
        let event_id: OwnedEventId = reply_to.parse().context("Invalid reply event ID")?;
        notice.relates_to = Some(Relation::Reply {
            in_reply_to: InReplyTo::new(event_id),
        });
    }
    Ok(notice)
}

#[async_trait]
impl RoomTransport for MatrixTransport {
    fn bot_user_id(&self) -> &str {
        &self.user_id
    }

    async fn send_room_message(&self, room_id: &str, content: MessageContent) -> Result<()> {
        let room = self.room(room_id)?;
        room.send(notice_content(content)?)
            .await
            .context("Failed to send message")?;
        Ok(())
    }

    async fn send_direct_message(&self, user_id: &str, content: MessageContent) -> Result<()> {
        let user_id: OwnedUserId = user_id.parse().context("Invalid user ID")?;
        let room = match self.client.get_dm_room(&user_id) {
            Some(room) => room,
            None => {
                tracing::info!(user_id = %user_id, "Creating direct room");
                self.client
                    .create_dm(&user_id)
                    .await
                    .context("Failed to create direct room")?
            }
        };

        room.send(notice_content(content)?)
            .await
            .context("Failed to send direct message")?;
        Ok(())
    }

    async fn react(&self, room_id: &str, event_id: &str, key: &str) -> Result<()> {
        let room = self.room(room_id)?;
        let event_id: OwnedEventId = event_id.parse().context("Invalid event ID")?;
        room.send(ReactionEventContent::new(Annotation::new(
            event_id,
            key.to_string(),
        )))
        .await
        .context("Failed to send reaction")?;
        Ok(())
    }

    async fn redact(&self, room_id: &str, event_id: &str, reason: &str) -> Result<()> {
        let room = self.room(room_id)?;
        let event_id: OwnedEventId = event_id.parse().context("Invalid event ID")?;
        room.redact(&event_id, Some(reason), None)
            .await
            .context("Failed to redact event")?;
        Ok(())
    }

    async fn get_event_sender(&self, room_id: &str, event_id: &str) -> Result<String> {
        let room = self.room(room_id)?;
        let event_id: OwnedEventId = event_id.parse().context("Invalid event ID")?;
        let event = room
            .event(&event_id, None)
            .await
            .context("Failed to fetch event")?;
        let sender: Option<OwnedUserId> = event
            .raw()
            .get_field("sender")
            .context("Malformed event")?;
        sender
            .map(|s| s.to_string())
            .context("Event has no sender")
    }

    async fn join_room(&self, room_id: &str) -> Result<()> {
        let room_id: OwnedRoomId = room_id.parse().context("Invalid room ID")?;
        self.client
            .join_room_by_id(&room_id)
            .await
            .context("Failed to join room")?;
        Ok(())
    }

    async fn get_power_level(&self, room_id: &str, user_id: &str) -> Result<i64> {
        let room = self.room(room_id)?;
        let user_id: OwnedUserId = user_id.parse().context("Invalid user ID")?;
        let power_levels = room
            .power_levels()
            .await
            .context("Failed to read power levels")?;
        let level = power_levels
            .users
            .get(&user_id)
            .copied()
            .unwrap_or(power_levels.users_default);
        Ok(level.into())
    }

    async fn set_power_level(&self, room_id: &str, user_id: &str, level: i64) -> Result<()> {
        let room = self.room(room_id)?;
        let user_id: OwnedUserId = user_id.parse().context("Invalid user ID")?;
        room.update_power_levels(vec![(&*user_id, Int::new_saturating(level))])
            .await
            .context("Failed to update power levels")?;
        Ok(())
    }

    async fn can_redact(&self, room_id: &str, user_id: &str) -> Result<bool> {
        let room = self.room(room_id)?;
        let user_id: OwnedUserId = user_id.parse().context("Invalid user ID")?;
        let power_levels = room
            .power_levels()
            .await
            .context("Failed to check redaction permission")?;
        Ok(power_levels.user_can_redact_event_of_other(&user_id))
    }
}
