// ABOUTME: Tests for the offline strikes commands against an on-disk database
// ABOUTME: Verifies show, list and clear output and that clear really resets the count

use tempfile::TempDir;
use warden::{strikes, InfractionStore};

const ROOM: &str = "!general:example.org";

fn seeded_store() -> (TempDir, InfractionStore) {
    let dir = TempDir::new().unwrap();
    let store = InfractionStore::open(dir.path().join("warden.db")).unwrap();
    store.record_infraction("@alice:example.org", ROOM).unwrap();
    store.record_infraction("@bob:example.org", ROOM).unwrap();
    store.record_infraction("@bob:example.org", ROOM).unwrap();
    (dir, store)
}

#[test]
fn test_show_reports_count() {
    let (_dir, store) = seeded_store();
    let output = strikes::show(&store, "@bob:example.org", ROOM).unwrap();
    assert_eq!(output, "@bob:example.org in !general:example.org: 2 strike(s)");
}

#[test]
fn test_list_orders_by_count() {
    let (_dir, store) = seeded_store();
    let output = strikes::list(&store, ROOM).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("@bob:example.org"));
    assert!(lines[0].ends_with('2'));
    assert!(lines[1].starts_with("@alice:example.org"));
}

#[test]
fn test_list_empty_room() {
    let (_dir, store) = seeded_store();
    let output = strikes::list(&store, "!quiet:example.org").unwrap();
    assert!(output.contains("No strikes"));
}

#[test]
fn test_clear_resets_and_reports_previous_count() {
    let (_dir, store) = seeded_store();
    let output = strikes::clear(&store, "@bob:example.org", ROOM).unwrap();
    assert!(output.starts_with("Cleared 2 strike(s)"));
    assert_eq!(store.get_attempts("@bob:example.org", ROOM).unwrap(), 0);
}
