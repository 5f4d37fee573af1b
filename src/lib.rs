// ABOUTME: Root library module for the Matrix side of warden
// ABOUTME: Wires matrix-sdk to the platform-agnostic dispatcher in warden-core

pub mod event_pump;
pub mod logging;
pub mod matrix_client;
pub mod platform;
pub mod strikes;

// Re-export platform-agnostic modules from warden-core
pub use warden_core::config;
pub use warden_core::paths;
pub use warden_core::{Config, EventDispatcher, InfractionStore};
