// ABOUTME: Single worker that drains inbound events and dispatches them strictly in order
// ABOUTME: A failed event is logged and the worker moves on to the next one

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use warden_core::{DispatchOutcome, EventDispatcher, InboundEvent};

/// Run until the sender side is dropped. Each dispatch is awaited before the
/// next event is taken, so handlers never overlap.
pub async fn run(dispatcher: Arc<EventDispatcher>, rx: mpsc::Receiver<InboundEvent>) {
    let mut events = ReceiverStream::new(rx);
    let mut handled: u64 = 0;

    while let Some(event) = events.next().await {
        let kind = event.kind();
        let room_id = event.room_id().to_string();

        match dispatcher.dispatch(event).await {
            Ok(DispatchOutcome::Handled) => handled += 1,
            Ok(DispatchOutcome::Ignored) => {}
            Err(e) => {
                tracing::error!(
                    kind,
                    room_id = %room_id,
                    error = %format!("{:#}", e),
                    "Failed to handle event"
                );
            }
        }
    }

    tracing::info!(handled, "Event stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::testing::MockTransport;
    use warden_core::{Config, InfractionStore, InviteEvent, TextMessage};

    #[tokio::test]
    async fn test_events_are_dispatched_in_order() {
        let transport = MockTransport::new("@warden:example.org");
        let dispatcher = EventDispatcher::new(
            Arc::new(transport.clone()),
            InfractionStore::in_memory().unwrap(),
            &Config::default(),
        )
        .unwrap();

        let (tx, rx) = mpsc::channel(8);
        for word in ["first", "second", "third"] {
            tx.send(InboundEvent::Text(TextMessage {
                room_id: "!dm:example.org".to_string(),
                room_name: None,
                event_id: format!("${}", word),
                sender: "@alice:example.org".to_string(),
                body: format!("echo {}", word),
                member_count: 2,
                is_thread_reply: false,
            }))
            .await
            .unwrap();
        }
        tx.send(InboundEvent::Invite(InviteEvent {
            room_id: "!new:example.org".to_string(),
            sender: "@alice:example.org".to_string(),
            invitee: "@warden:example.org".to_string(),
        }))
        .await
        .unwrap();
        drop(tx);

        run(Arc::new(dispatcher), rx).await;

        let replies: Vec<String> = transport
            .room_messages()
            .into_iter()
            .map(|m| m.plain)
            .collect();
        assert_eq!(replies, vec!["first", "second", "third"]);
        assert_eq!(transport.join_attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_event_does_not_stop_the_worker() {
        let transport = MockTransport::new("@warden:example.org").failing_sends(1);
        let dispatcher = EventDispatcher::new(
            Arc::new(transport.clone()),
            InfractionStore::in_memory().unwrap(),
            &Config::default(),
        )
        .unwrap();

        let (tx, rx) = mpsc::channel(8);
        for word in ["dropped", "delivered"] {
            tx.send(InboundEvent::Text(TextMessage {
                room_id: "!dm:example.org".to_string(),
                room_name: None,
                event_id: format!("${}", word),
                sender: "@alice:example.org".to_string(),
                body: format!("echo {}", word),
                member_count: 2,
                is_thread_reply: false,
            }))
            .await
            .unwrap();
        }
        drop(tx);

        run(Arc::new(dispatcher), rx).await;

        let replies: Vec<String> = transport
            .room_messages()
            .into_iter()
            .map(|m| m.plain)
            .collect();
        assert_eq!(replies, vec!["delivered"]);
    }
}
