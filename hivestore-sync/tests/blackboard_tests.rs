use hivestore_sync::{Blackboard, BlackboardValue, FileBlackboard, MemoryBlackboard};
use std::time::Duration;

// ── MemoryBlackboard ─────────────────────────────────────────────

#[test]
fn get_returns_what_set_wrote() {
    let board = MemoryBlackboard::new();
    assert!(board.get("app").is_none());

    board.set("app", BlackboardValue::Flag(true));
    assert_eq!(board.get("app"), Some(BlackboardValue::Flag(true)));

    board.set("app", BlackboardValue::Flag(false));
    assert_eq!(board.get("app"), Some(BlackboardValue::Flag(false)));
}

#[test]
fn remove_deletes_the_key() {
    let board = MemoryBlackboard::new();
    board.set("app", BlackboardValue::Flag(true));
    board.remove("app");
    assert!(board.get("app").is_none());
    assert!(board.is_empty());

    // Removing an absent key is a no-op.
    board.remove("app");
}

#[test]
fn append_creates_and_grows_a_queue_in_order() {
    let board = MemoryBlackboard::new();
    board.append("app->ext", b"one".to_vec());
    board.append("app->ext", b"two".to_vec());
    board.append("app->ext", b"three".to_vec());

    let Some(BlackboardValue::Queue(entries)) = board.get("app->ext") else {
        panic!("expected a queue");
    };
    assert_eq!(entries, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
}

#[tokio::test]
async fn subscribers_see_every_mutation_of_their_key() {
    let board = MemoryBlackboard::new();
    let mut rx = board.subscribe("ext->app");

    board.set("ext->app", BlackboardValue::Queue(Vec::new()));
    board.append("ext->app", b"x".to_vec());
    board.remove("ext->app");

    assert_eq!(rx.try_recv().unwrap(), "ext->app");
    assert_eq!(rx.try_recv().unwrap(), "ext->app");
    assert_eq!(rx.try_recv().unwrap(), "ext->app");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn subscribers_do_not_see_other_keys() {
    let board = MemoryBlackboard::new();
    let mut rx = board.subscribe("ext->app");

    board.set("app", BlackboardValue::Flag(true));
    board.append("app->ext", b"x".to_vec());

    assert!(rx.try_recv().is_err());
}

// ── FileBlackboard ───────────────────────────────────────────────

fn board_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("blackboard.json")
}

#[tokio::test]
async fn file_board_persists_values() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = board_path(&dir);

    let writer = FileBlackboard::open(&path, Duration::from_secs(60)).unwrap();
    writer.set("app", BlackboardValue::Flag(true));
    writer.append("app->ext", b"record".to_vec());

    // A second instance over the same file reads through to disk.
    let reader = FileBlackboard::open(&path, Duration::from_secs(60)).unwrap();
    assert_eq!(reader.get("app"), Some(BlackboardValue::Flag(true)));
    assert_eq!(
        reader.get("app->ext"),
        Some(BlackboardValue::Queue(vec![b"record".to_vec()]))
    );
}

#[tokio::test]
async fn file_board_poll_signals_external_changes() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = board_path(&dir);

    let local = FileBlackboard::open(&path, Duration::from_secs(60)).unwrap();
    let remote = FileBlackboard::open(&path, Duration::from_secs(60)).unwrap();

    let mut rx = local.subscribe("ext->app");
    remote.append("ext->app", b"record".to_vec());

    // The local instance has not polled yet, so nothing has arrived.
    assert!(rx.try_recv().is_err());

    local.poll();
    assert_eq!(rx.try_recv().unwrap(), "ext->app");

    // Polling again with no further change stays quiet.
    local.poll();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn file_board_watcher_picks_up_external_changes() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = board_path(&dir);

    let local = FileBlackboard::open(&path, Duration::from_millis(10)).unwrap();
    let remote = FileBlackboard::open(&path, Duration::from_secs(60)).unwrap();

    let mut rx = local.subscribe("ext->app");
    remote.set("ext->app", BlackboardValue::Queue(vec![b"x".to_vec()]));

    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("watcher never signaled")
        .expect("subscription closed");
}

#[tokio::test]
async fn file_board_local_writes_signal_local_subscribers() {
    let dir = tempfile::TempDir::new().unwrap();
    let board = FileBlackboard::open(board_path(&dir), Duration::from_secs(60)).unwrap();

    let mut rx = board.subscribe("app");
    board.set("app", BlackboardValue::Flag(true));
    assert_eq!(rx.try_recv().unwrap(), "app");
}

#[tokio::test]
async fn file_board_rejects_a_corrupt_image() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = board_path(&dir);
    std::fs::write(&path, b"not json").unwrap();

    assert!(FileBlackboard::open(&path, Duration::from_secs(60)).is_err());
}
