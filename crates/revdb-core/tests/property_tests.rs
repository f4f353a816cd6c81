use proptest::prelude::*;
use revdb_core::{Document, DocumentId, Properties, RevisionId, Value};

#[derive(Debug, Clone)]
enum Op {
    /// CAS write on top of the current revision
    Put(i64),
    /// CAS write against a possibly stale revision
    PutStale(usize, i64),
    Delete,
    /// Branch under an existing revision, or a new root
    Force(Option<usize>, i64, bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..50).prop_map(Op::Put),
        (0usize..16, 0i64..50).prop_map(|(i, n)| Op::PutStale(i, n)),
        Just(Op::Delete),
        (proptest::option::of(0usize..16), 0i64..50, any::<bool>())
            .prop_map(|(p, n, d)| Op::Force(p, n, d)),
    ]
}

fn props(n: i64) -> Properties {
    let mut props = Properties::new();
    props.insert("n".into(), Value::from(n));
    props
}

fn apply(doc: &Document, ops: &[Op]) {
    for op in ops {
        let known: Vec<RevisionId> = doc.revisions().iter().map(|r| r.id().clone()).collect();
        let pick = |i: usize| known.get(i % known.len().max(1)).cloned();

        match op {
            Op::Put(n) => {
                let parent = doc.current_revision_id();
                doc.put(props(*n), parent.as_ref()).unwrap();
            }
            Op::PutStale(i, n) => {
                let parent = pick(*i);
                let before = doc.revisions().len();
                match doc.put(props(*n), parent.as_ref()) {
                    Ok(rev) => assert_eq!(rev.parent_id(), parent.as_ref()),
                    Err(e) => {
                        assert!(e.is_conflict());
                        assert_eq!(doc.revisions().len(), before);
                    }
                }
            }
            Op::Delete => {
                let _ = doc.delete();
            }
            Op::Force(i, n, deleted) => {
                let parent = i.and_then(pick);
                let body = if *deleted { Properties::new() } else { props(*n) };
                doc.force_insert(body, parent.as_ref(), *deleted).unwrap();
            }
        }
    }
}

proptest! {
    #[test]
    fn current_is_always_a_single_leaf(ops in prop::collection::vec(op(), 1..40)) {
        let doc = Document::new(DocumentId::new("prop").unwrap());
        apply(&doc, &ops);

        if let Some(current) = doc.current_revision() {
            let leaves = doc.leaf_revisions();
            prop_assert!(leaves.iter().any(|l| l.id() == current.id()));
            prop_assert_eq!(leaves[0].id(), current.id());
            prop_assert!(leaves.iter().all(|l| l.id() <= current.id()));

            let conflicts = doc.conflicting_revisions();
            prop_assert_eq!(conflicts.len(), leaves.len() - 1);
            prop_assert!(conflicts.iter().all(|c| c.id() != current.id()));

            let history = doc.revision_history();
            prop_assert_eq!(history.last().map(|r| r.id()), Some(current.id()));
            prop_assert!(history[0].parent_id().is_none());
        }
    }

    #[test]
    fn winner_is_independent_of_insertion_order(ops in prop::collection::vec(op(), 1..40)) {
        let source = Document::new(DocumentId::new("prop").unwrap());
        apply(&source, &ops);

        // parents first, but otherwise a different order than the source writes
        let mut revisions = source.revisions();
        revisions.sort_by(|a, b| a.generation().cmp(&b.generation()).then(b.id().cmp(a.id())));

        let replay = Document::new(DocumentId::new("prop").unwrap());
        for rev in &revisions {
            replay.restore_revision(rev).unwrap();
        }

        prop_assert_eq!(replay.current_revision_id(), source.current_revision_id());
        prop_assert_eq!(replay.state(), source.state());

        let left: Vec<_> = source.leaf_revisions().iter().map(|r| r.id().clone()).collect();
        let right: Vec<_> = replay.leaf_revisions().iter().map(|r| r.id().clone()).collect();
        prop_assert_eq!(left, right);
    }
}
