use hivestore_manager::{
    Blackboard, BlackboardValue, ClearPolicy, ManagerConfig, ManagerError, ManagerEvent,
    MemoryBlackboard, PeerSyncConfig, StoreError, StoreManager,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn manager_at(path: &Path, model_version: &str) -> StoreManager {
    StoreManager::new(ManagerConfig {
        container_name: "test".into(),
        store_path: Some(path.to_path_buf()),
        model_version: model_version.into(),
    })
}

/// Polls `cond` for up to two seconds.
async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

// ── configuration ────────────────────────────────────────────────

#[test]
fn explicit_store_path_wins() {
    let config = ManagerConfig {
        store_path: Some("/tmp/elsewhere/store.sqlite3".into()),
        ..Default::default()
    };
    assert_eq!(
        config.store_path(),
        Path::new("/tmp/elsewhere/store.sqlite3")
    );
}

#[test]
fn default_store_path_is_per_container() {
    let config = ManagerConfig {
        container_name: "notes".into(),
        ..Default::default()
    };
    let path = config.store_path();
    assert!(path.ends_with("notes/hivestore.sqlite3"));
}

// ── load ─────────────────────────────────────────────────────────

#[tokio::test]
async fn load_installs_store_and_primary_context() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    assert!(manager.primary_context().is_none());
    assert!(manager.store().is_none());

    let report = manager.load(None, ClearPolicy::Never).await.unwrap();
    assert!(!report.cleared);
    assert!(manager.store().is_some());

    let primary = manager.primary_context().unwrap();
    assert_eq!(primary.label(), "primary");
    assert!(primary.auto_merges_changes());
}

#[tokio::test]
async fn load_emits_completion_event() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    let mut events = manager.subscribe();

    manager.load(None, ClearPolicy::Never).await.unwrap();
    assert_eq!(
        events.try_recv().unwrap(),
        ManagerEvent::LoadCompleted { cleared: false }
    );
}

#[tokio::test]
async fn failed_load_emits_failure_event() {
    let dir = TempDir::new().unwrap();
    // No store on disk, a required version, and no permission to clear.
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v2");
    let mut events = manager.subscribe();

    let err = manager
        .load(Some("v2"), ClearPolicy::Never)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Store(StoreError::VersionMismatch(_))
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        ManagerEvent::LoadFailed { .. }
    ));
    assert!(manager.primary_context().is_none());
}

#[tokio::test]
async fn load_recovers_an_incompatible_store_when_allowed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite3");

    // First run writes v1 data.
    let old = manager_at(&path, "v1");
    old.load(None, ClearPolicy::Never).await.unwrap();
    let ctx = old.primary_context().unwrap();
    ctx.create("note", json!({"old": true}));
    ctx.save().unwrap();
    old.shutdown();

    // Second run requires v2 and may clear.
    let new = manager_at(&path, "v2");
    let report = new
        .load(Some("v2"), ClearPolicy::IfMigrationFails)
        .await
        .unwrap();
    assert!(report.cleared);
    assert_eq!(new.store().unwrap().object_count().unwrap(), 0);
}

// ── contexts ─────────────────────────────────────────────────────

#[tokio::test]
async fn background_context_requires_a_loaded_store() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");

    let err = manager.new_background_context("worker").unwrap_err();
    assert!(matches!(err, ManagerError::NotLoaded));
}

#[tokio::test]
async fn dropped_background_contexts_stop_receiving_merges() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    manager.load(None, ClearPolicy::Never).await.unwrap();

    let background = manager.new_background_context("worker").unwrap();
    let weak = Arc::downgrade(&background);
    drop(background);

    // The registry never kept the context alive.
    assert!(weak.upgrade().is_none());
}

// ── sync ─────────────────────────────────────────────────────────

#[tokio::test]
async fn enable_sync_requires_a_loaded_store() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    let board: Arc<dyn Blackboard> = Arc::new(MemoryBlackboard::new());

    let err = manager
        .enable_sync(board, PeerSyncConfig::new("app", ["ext"]).unwrap())
        .unwrap_err();
    assert!(matches!(err, ManagerError::NotLoaded));
    assert!(!manager.is_sync_enabled());
}

#[tokio::test]
async fn sync_lifecycle_flags_liveness() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    manager.load(None, ClearPolicy::Never).await.unwrap();

    let board: Arc<dyn Blackboard> = Arc::new(MemoryBlackboard::new());
    manager
        .enable_sync(board.clone(), PeerSyncConfig::new("app", ["ext"]).unwrap())
        .unwrap();
    assert!(manager.is_sync_enabled());
    assert_eq!(board.get("app"), Some(BlackboardValue::Flag(true)));

    manager.disable_sync();
    assert!(!manager.is_sync_enabled());
    assert_eq!(board.get("app"), Some(BlackboardValue::Flag(false)));
}

#[tokio::test]
async fn re_enabling_sync_leaves_liveness_true() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    manager.load(None, ClearPolicy::Never).await.unwrap();

    let board: Arc<dyn Blackboard> = Arc::new(MemoryBlackboard::new());
    manager
        .enable_sync(board.clone(), PeerSyncConfig::new("app", ["ext"]).unwrap())
        .unwrap();
    manager
        .enable_sync(board.clone(), PeerSyncConfig::new("app", ["ext"]).unwrap())
        .unwrap();

    assert_eq!(board.get("app"), Some(BlackboardValue::Flag(true)));
}

#[tokio::test]
async fn saves_without_sync_stay_local() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    manager.load(None, ClearPolicy::Never).await.unwrap();

    let ctx = manager.primary_context().unwrap();
    let id = ctx.create("note", json!({"local": true}));
    let record = ctx.save().unwrap();
    assert!(record.inserted.contains(&id));
}

#[tokio::test]
async fn saves_propagate_between_two_managers() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite3");
    let board: Arc<dyn Blackboard> = Arc::new(MemoryBlackboard::new());

    // Two processes of one family, sharing the store file and the board.
    let app = manager_at(&path, "v1");
    app.load(None, ClearPolicy::Never).await.unwrap();
    app.enable_sync(board.clone(), PeerSyncConfig::new("app", ["ext"]).unwrap())
        .unwrap();

    let ext = manager_at(&path, "v1");
    ext.load(None, ClearPolicy::Never).await.unwrap();
    ext.enable_sync(board.clone(), PeerSyncConfig::new("ext", ["app"]).unwrap())
        .unwrap();

    let writer = app.primary_context().unwrap();
    let id = writer.create("note", json!({"from": "app"}));
    writer.save().unwrap();

    let reader = ext.primary_context().unwrap();
    let probe = reader.clone();
    wait_until("record merges into the other manager", move || {
        probe.registered_ids().contains(&id)
    })
    .await;
    assert_eq!(
        reader.object(&id).unwrap().unwrap().data,
        json!({"from": "app"})
    );
}

#[tokio::test]
async fn background_context_saves_publish_too() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite3");
    let board: Arc<dyn Blackboard> = Arc::new(MemoryBlackboard::new());

    let app = manager_at(&path, "v1");
    app.load(None, ClearPolicy::Never).await.unwrap();
    app.enable_sync(board.clone(), PeerSyncConfig::new("app", ["ext"]).unwrap())
        .unwrap();

    let ext = manager_at(&path, "v1");
    ext.load(None, ClearPolicy::Never).await.unwrap();
    ext.enable_sync(board.clone(), PeerSyncConfig::new("ext", ["app"]).unwrap())
        .unwrap();

    let worker = app.new_background_context("worker").unwrap();
    let id = worker.create("note", json!({"from": "worker"}));
    worker.save().unwrap();

    let reader = ext.primary_context().unwrap();
    let probe = reader.clone();
    wait_until("background save reaches the other manager", move || {
        probe.registered_ids().contains(&id)
    })
    .await;
}

#[tokio::test]
async fn shutdown_releases_store_and_sync() {
    let dir = TempDir::new().unwrap();
    let manager = manager_at(&dir.path().join("store.sqlite3"), "v1");
    manager.load(None, ClearPolicy::Never).await.unwrap();

    let board: Arc<dyn Blackboard> = Arc::new(MemoryBlackboard::new());
    manager
        .enable_sync(board.clone(), PeerSyncConfig::new("app", ["ext"]).unwrap())
        .unwrap();

    manager.shutdown();
    assert!(manager.store().is_none());
    assert!(!manager.is_sync_enabled());
    assert_eq!(board.get("app"), Some(BlackboardValue::Flag(false)));
}
