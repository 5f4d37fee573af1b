// ABOUTME: Metric names and recording helpers built on the metrics facade
// ABOUTME: Counters are no-ops until an exporter is installed by the binary

pub const EVENTS_TOTAL: &str = "warden_events_total";
pub const MODERATION_TOTAL: &str = "warden_moderation_total";
pub const COMMANDS_TOTAL: &str = "warden_commands_total";
pub const RETRIES_EXHAUSTED_TOTAL: &str = "warden_retries_exhausted_total";
pub const SYNC_RESTARTS_TOTAL: &str = "warden_sync_restarts_total";

pub fn record_event(kind: &'static str) {
    metrics::counter!(EVENTS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_moderation(outcome: &'static str) {
    metrics::counter!(MODERATION_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_command(command: &'static str) {
    metrics::counter!(COMMANDS_TOTAL, "command" => command).increment(1);
}

pub fn record_retries_exhausted(operation: &'static str) {
    metrics::counter!(RETRIES_EXHAUSTED_TOTAL, "operation" => operation).increment(1);
}

pub fn record_sync_restart() {
    metrics::counter!(SYNC_RESTARTS_TOTAL).increment(1);
}
