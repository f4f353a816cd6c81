use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use revdb_core::{Document, DocumentId, Properties, Value};

fn props(n: usize) -> Properties {
    let mut props = Properties::new();
    props.insert("n".into(), Value::from(n as i64));
    props.insert("title".into(), Value::from("benchmark document"));
    props
}

fn bench_linear_puts(c: &mut Criterion) {
    c.bench_function("put_chain_1000", |b| {
        b.iter(|| {
            let doc = Document::new(DocumentId::new("bench").unwrap());
            let mut parent = None;
            for n in 0..1000 {
                let rev = doc.put(props(n), parent.as_ref()).unwrap();
                parent = Some(rev.id().clone());
            }
            black_box(doc.current_revision_id())
        })
    });
}

fn bench_wide_conflicts(c: &mut Criterion) {
    let mut group = c.benchmark_group("conflicts");
    for width in [10usize, 100, 1000] {
        let doc = Document::new(DocumentId::new("wide").unwrap());
        let root = doc.put(props(0), None).unwrap();
        for n in 0..width {
            doc.force_insert(props(n + 1), Some(root.id()), false).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(width), &doc, |b, doc| {
            b.iter(|| black_box(doc.conflicting_revisions().len()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_linear_puts, bench_wide_conflicts);
criterion_main!(benches);
