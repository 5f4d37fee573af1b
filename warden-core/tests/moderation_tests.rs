// ABOUTME: Tests for the moderation policy's warn and mute escalation
// ABOUTME: Uses MockTransport and an in-memory infraction store

use warden_core::config::ModerationConfig;
use warden_core::testing::{MockTransport, TransportCall};
use warden_core::{InfractionStore, ModerationOutcome, ModerationPolicy, RoomContext};

const BOT: &str = "@warden:example.org";
const USER: &str = "@alice:example.org";
const ROOM: &str = "!general:example.org";

fn context() -> RoomContext {
    RoomContext {
        room_id: ROOM.to_string(),
        room_name: Some("General".to_string()),
        event_id: "$chatter".to_string(),
        sender: USER.to_string(),
        member_count: 10,
        has_prefix: false,
        is_thread_reply: false,
    }
}

fn store_with_attempts(n: i64) -> InfractionStore {
    let store = InfractionStore::in_memory().unwrap();
    for _ in 0..n {
        store.record_infraction(USER, ROOM).unwrap();
    }
    store
}

#[tokio::test]
async fn test_first_offence_redacts_and_warns() {
    let transport = MockTransport::new(BOT);
    let store = store_with_attempts(0);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::Warned { attempts: 1 });
    assert_eq!(transport.redaction_attempts(), 1);
    assert!(transport.calls().contains(&TransportCall::Redact {
        room_id: ROOM.to_string(),
        event_id: "$chatter".to_string(),
        reason: "not a moderator, please use threads".to_string(),
    }));
    assert_eq!(store.get_attempts(USER, ROOM).unwrap(), 1);
}

#[tokio::test]
async fn test_below_threshold_increments_and_warns() {
    let transport = MockTransport::new(BOT);
    let store = store_with_attempts(2);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::Warned { attempts: 3 });
    assert_eq!(store.get_attempts(USER, ROOM).unwrap(), 3);

    let dms = transport.direct_messages();
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].0, USER);
    assert!(dms[0].1.plain.contains("3 times"));
    assert!(dms[0].1.plain.contains("General"));
    assert_eq!(
        transport.count(|c| matches!(c, TransportCall::SetPowerLevel { .. })),
        0
    );
}

#[tokio::test]
async fn test_at_threshold_clears_and_mutes() {
    let transport = MockTransport::new(BOT);
    let store = store_with_attempts(3);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::Muted);
    assert_eq!(store.get_attempts(USER, ROOM).unwrap(), 0);
    assert!(transport.calls().contains(&TransportCall::SetPowerLevel {
        room_id: ROOM.to_string(),
        user_id: USER.to_string(),
        level: -1,
    }));

    let dms = transport.direct_messages();
    assert_eq!(dms.len(), 1);
    assert!(dms[0].1.plain.contains("group admin"));
}

#[tokio::test]
async fn test_moderator_is_exempt() {
    let transport = MockTransport::new(BOT).with_power_level(ROOM, USER, 50);
    let store = store_with_attempts(2);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::Exempt);
    assert_eq!(transport.redaction_attempts(), 0);
    assert!(transport.direct_messages().is_empty());
    assert_eq!(store.get_attempts(USER, ROOM).unwrap(), 2);
}

#[tokio::test]
async fn test_without_redaction_rights_nothing_changes() {
    let transport = MockTransport::new(BOT).with_can_redact(false);
    let store = store_with_attempts(1);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::CannotRedact);
    assert_eq!(transport.redaction_attempts(), 0);
    assert!(transport.direct_messages().is_empty());
    assert_eq!(store.get_attempts(USER, ROOM).unwrap(), 1);
}

#[tokio::test]
async fn test_failed_redaction_still_counts() {
    let transport = MockTransport::new(BOT).failing_redactions(5);
    let store = store_with_attempts(0);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(transport.redaction_attempts(), 3);
    assert_eq!(outcome, ModerationOutcome::Warned { attempts: 1 });
    assert_eq!(store.get_attempts(USER, ROOM).unwrap(), 1);
}

#[tokio::test]
async fn test_redaction_retries_until_success() {
    let transport = MockTransport::new(BOT).failing_redactions(1);
    let store = store_with_attempts(0);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(transport.redaction_attempts(), 2);
}

#[tokio::test]
async fn test_configured_threshold_and_mute_level() {
    let transport = MockTransport::new(BOT);
    let store = store_with_attempts(1);
    let policy = ModerationPolicy::new(ModerationConfig {
        threshold: 1,
        mute_power_level: -10,
        ..ModerationConfig::default()
    });

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::Muted);
    assert!(transport.calls().contains(&TransportCall::SetPowerLevel {
        room_id: ROOM.to_string(),
        user_id: USER.to_string(),
        level: -10,
    }));
}

#[tokio::test]
async fn test_direct_chat_is_not_moderated() {
    let transport = MockTransport::new(BOT);
    let store = store_with_attempts(0);
    let policy = ModerationPolicy::new(ModerationConfig::default());
    let ctx = RoomContext {
        member_count: 2,
        ..context()
    };

    let outcome = policy.enforce(&ctx, &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::NotApplicable);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_power_lookup_failure_skips_moderation() {
    let transport = MockTransport::new(BOT).failing_power_lookups();
    let store = store_with_attempts(1);
    let policy = ModerationPolicy::new(ModerationConfig::default());

    let outcome = policy.enforce(&context(), &transport, &store).await.unwrap();

    assert_eq!(outcome, ModerationOutcome::LookupFailed);
    assert_eq!(transport.redaction_attempts(), 0);
    assert!(transport.direct_messages().is_empty());
    assert_eq!(store.get_attempts(USER, ROOM).unwrap(), 1);
}
