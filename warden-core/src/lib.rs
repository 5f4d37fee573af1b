// ABOUTME: Platform-agnostic event dispatch and moderation for chat room bots
// ABOUTME: Provides the transport trait, infraction store, moderation policy, and command router

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod infractions;
pub mod metrics;
pub mod moderation;
pub mod paths;
pub mod retry;
pub mod testing;
pub mod traits;
pub mod utils;

pub use commands::{CommandInvocation, CommandKind, CommandRouter};
pub use config::Config;
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use infractions::{InfractionRecord, InfractionStore};
pub use moderation::{ModerationOutcome, ModerationPolicy, RoomContext};
pub use traits::{
    InboundEvent, InviteEvent, MessageContent, ReactionEvent, RoomTransport, TextMessage,
    UndecryptableEvent,
};
