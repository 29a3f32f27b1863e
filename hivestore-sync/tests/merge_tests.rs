use hivestore_store::{Store, WorkingContext};
use hivestore_sync::{ChangeMergeEngine, ContextRegistry};
use hivestore_types::{ChangeRecord, ObjectId};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<Store> {
    Arc::new(Store::open(&dir.path().join("store.sqlite3"), "v1").unwrap())
}

/// Saves one object through a scratch context and returns its id and record.
fn seed_object(store: &Arc<Store>) -> (ObjectId, ChangeRecord) {
    let writer = WorkingContext::new(store.clone(), "writer");
    let id = writer.create("note", json!({"seed": true}));
    let record = writer.save().unwrap();
    (id, record)
}

#[test]
fn applies_only_to_auto_merging_contexts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (id, record) = seed_object(&store);

    let merging = Arc::new(WorkingContext::new(store.clone(), "merging"));
    let opted_out = Arc::new(WorkingContext::new(store, "opted-out"));
    opted_out.set_auto_merge(false);

    let engine = ChangeMergeEngine::new();
    let applied = engine.apply(&record, &[merging.clone(), opted_out.clone()]);

    assert_eq!(applied, 1);
    assert_eq!(merging.registered_ids(), vec![id]);
    assert!(opted_out.registered_ids().is_empty());
}

#[test]
fn empty_record_applies_to_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let ctx = Arc::new(WorkingContext::new(store, "main"));

    let engine = ChangeMergeEngine::new();
    assert_eq!(engine.apply(&ChangeRecord::new(), &[ctx]), 0);
}

#[test]
fn apply_twice_equals_apply_once() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (id, record) = seed_object(&store);

    let ctx = Arc::new(WorkingContext::new(store, "main"));
    let engine = ChangeMergeEngine::new();

    engine.apply(&record, std::slice::from_ref(&ctx));
    let after_once = ctx.registered_ids();

    engine.apply(&record, std::slice::from_ref(&ctx));
    let after_twice = ctx.registered_ids();

    assert_eq!(after_once, vec![id]);
    assert_eq!(after_once, after_twice);
}

#[test]
fn unresolvable_identifiers_are_not_an_error() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let ctx = Arc::new(WorkingContext::new(store, "main"));

    let record = ChangeRecord::new()
        .with_inserted([ObjectId::new()])
        .with_deleted([ObjectId::new()]);

    let engine = ChangeMergeEngine::new();
    // The record applies cleanly even though nothing resolves.
    assert_eq!(engine.apply(&record, std::slice::from_ref(&ctx)), 1);
    assert!(ctx.registered_ids().is_empty());
}

#[test]
fn apply_to_registry_uses_a_live_snapshot() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (id, record) = seed_object(&store);

    let registry = ContextRegistry::new();
    let primary = Arc::new(WorkingContext::new(store.clone(), "primary"));
    registry.set_primary(primary.clone());

    let dropped = Arc::new(WorkingContext::new(store, "dropped"));
    registry.register(&dropped);
    drop(dropped);

    let engine = ChangeMergeEngine::new();
    let applied = engine.apply_to_registry(&record, &registry);

    // Only the primary was still live.
    assert_eq!(applied, 1);
    assert_eq!(primary.registered_ids(), vec![id]);
}
