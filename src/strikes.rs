// ABOUTME: Offline inspection and reset of infraction counts for the `strikes` CLI
// ABOUTME: Works directly on the database without connecting to the homeserver

use anyhow::Result;
use warden_core::InfractionStore;

pub fn show(store: &InfractionStore, user_id: &str, room_id: &str) -> Result<String> {
    let attempts = store.get_attempts(user_id, room_id)?;
    Ok(format!("{} in {}: {} strike(s)", user_id, room_id, attempts))
}

pub fn list(store: &InfractionStore, room_id: &str) -> Result<String> {
    let records = store.list_for_room(room_id)?;
    if records.is_empty() {
        return Ok(format!("No strikes recorded in {}", room_id));
    }

    let width = records.iter().map(|r| r.user_id.len()).max().unwrap_or(0);
    let lines: Vec<String> = records
        .iter()
        .map(|r| format!("{:<width$}  {}", r.user_id, r.attempts, width = width))
        .collect();
    Ok(lines.join("\n"))
}

pub fn clear(store: &InfractionStore, user_id: &str, room_id: &str) -> Result<String> {
    let before = store.get_attempts(user_id, room_id)?;
    store.clear(user_id, room_id)?;
    tracing::info!(user_id, room_id, before, "Strikes cleared from CLI");
    Ok(format!(
        "Cleared {} strike(s) for {} in {}",
        before, user_id, room_id
    ))
}
