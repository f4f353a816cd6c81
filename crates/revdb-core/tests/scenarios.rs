use revdb_core::{DocumentId, DocumentState, DocumentStore, Error, Properties, Value};
use std::sync::Arc;

fn props(json: serde_json::Value) -> Properties {
    match Value::from(json) {
        Value::Object(map) => map,
        other => panic!("not an object: {:?}", other),
    }
}

fn id(s: &str) -> DocumentId {
    DocumentId::new(s).unwrap()
}

#[test]
fn write_chain_then_stale_write_conflicts() {
    let store = DocumentStore::new();
    let doc = store.get_or_create(&id("scenario:1"));
    assert_eq!(doc.state(), DocumentState::New);

    let r1 = doc.put(props(serde_json::json!({"a": 1})), None).unwrap();
    assert_eq!(r1.generation(), 1);

    let r2 = doc.put(props(serde_json::json!({"a": 2})), Some(r1.id())).unwrap();
    assert_eq!(r2.generation(), 2);
    assert_eq!(doc.current_revision_id().as_ref(), Some(r2.id()));

    let before = doc.revisions().len();
    let err = doc.put(props(serde_json::json!({"a": 3})), Some(r1.id())).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(doc.revisions().len(), before, "failed put must not insert");
    assert_eq!(doc.current_revision_id().as_ref(), Some(r2.id()));
}

#[test]
fn forced_branch_reports_non_current_leaf() {
    let store = DocumentStore::new();
    let doc = store.get_or_create(&id("scenario:branch"));

    let r1 = doc.put(props(serde_json::json!({"a": 1})), None).unwrap();
    let r2 = doc.put(props(serde_json::json!({"a": 2})), Some(r1.id())).unwrap();
    let r3 = doc
        .force_insert(props(serde_json::json!({"a": 3})), Some(r1.id()), false)
        .unwrap();

    let current = doc.current_revision().unwrap();
    let expected_winner = std::cmp::max(r2.id(), r3.id());
    assert_eq!(current.id(), expected_winner);

    let conflicts = doc.conflicting_revisions();
    assert_eq!(conflicts.len(), 1);
    assert_ne!(conflicts[0].id(), current.id());
    assert!(doc.leaf_revisions().iter().any(|rev| rev.id() == current.id()));
}

#[test]
fn delete_then_resurrect() {
    let store = DocumentStore::new();
    let doc = store.get_or_create(&id("scenario:delete"));

    let r1 = doc.put(props(serde_json::json!({"a": 1})), None).unwrap();
    let r2 = doc.put(props(serde_json::json!({"a": 2})), Some(r1.id())).unwrap();
    let r3 = doc.delete().unwrap();

    assert_eq!(r3.generation(), 3);
    assert!(r3.is_deleted());
    assert!(doc.current_revision().unwrap().is_deleted());
    assert_eq!(doc.state(), DocumentState::Deleted);
    assert_eq!(r3.parent_id(), Some(r2.id()));

    let r4 = doc.put(props(serde_json::json!({"a": 4})), Some(r3.id())).unwrap();
    assert!(!r4.is_deleted());
    assert_eq!(doc.state(), DocumentState::Active);
    assert_eq!(doc.property("a"), Some(Value::from(4i64)));
}

#[test]
fn purge_then_recreate_shares_nothing() {
    let store = DocumentStore::new();
    let doc = store.get_or_create(&id("scenario:purge"));
    let r1 = doc.put(props(serde_json::json!({"a": 1})), None).unwrap();

    doc.purge().unwrap();
    assert!(doc.revisions().is_empty());

    let fresh = store.get_or_create(&id("scenario:purge"));
    assert!(!Arc::ptr_eq(&doc, &fresh));
    assert_eq!(fresh.state(), DocumentState::New);
    assert!(fresh.revision(r1.id()).is_none());

    // old handle stays purged even though the id lives on
    assert!(doc.purge().unwrap_err().is_not_found());
    fresh.put(props(serde_json::json!({"b": 1})), None).unwrap();
    assert_eq!(doc.state(), DocumentState::Purged);
}

#[test]
fn properties_round_trip_exactly() {
    let store = DocumentStore::new();
    let doc = store.get_or_create(&id("scenario:roundtrip"));

    let written = props(serde_json::json!({
        "title": "The Left Hand of Darkness",
        "year": 1969,
        "rating": 4.25,
        "available": true,
        "isbn": null,
        "authors": ["Ursula K. Le Guin"],
        "series": {"name": "Hainish Cycle", "order": [4, "of", 8]},
    }));

    let rev = doc.put(written.clone(), None).unwrap();
    let read = doc.revision(rev.id()).unwrap();
    assert_eq!(read.properties(), &written);
    assert_eq!(doc.user_properties().unwrap(), written);
}

#[test]
fn history_runs_root_to_current() {
    let store = DocumentStore::new();
    let doc = store.get_or_create(&id("scenario:history"));

    let mut parent = None;
    let mut ids = Vec::new();
    for n in 0..5 {
        let rev = doc.put(props(serde_json::json!({"n": n})), parent.as_ref()).unwrap();
        ids.push(rev.id().clone());
        parent = Some(rev.id().clone());
    }

    let history: Vec<_> = doc.revision_history().iter().map(|r| r.id().clone()).collect();
    assert_eq!(history, ids);
    assert!(history[0].generation() == 1);
}

#[test]
fn error_reports_carry_codes() {
    let store = DocumentStore::new();
    let doc = store.get_or_create(&id("scenario:errors"));

    let report = doc.delete().unwrap_err().report();
    assert_eq!(report.code, "NOT_FOUND");
    assert_eq!(report.status, 404);

    let report = doc
        .put(props(serde_json::json!({"_rev": "1-ab"})), None)
        .unwrap_err()
        .report();
    assert_eq!(report.code, "VALIDATION");

    doc.put(Properties::new(), None).unwrap();
    let report = doc.put(Properties::new(), None).unwrap_err().report();
    assert_eq!(report.code, "CONFLICT");
    assert_eq!(report.status, 409);
}
