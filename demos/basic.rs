//! Basic revdb Example
//!
//! Walks through writes, conflicts, tombstones and purge on an embedded
//! document store, then persists and reloads a document.
//!
//! Run with: cargo run --example basic

use revdb_core::{DocumentId, DocumentStore, Properties, Value};
use revdb_storage::{load_document, save_document, MemoryStorage};

fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("revdb Basic Example\n");

    let store = DocumentStore::new();
    let mut changes = store.subscribe();

    println!("=== Optimistic writes ===\n");
    let id = DocumentId::new("user:alice")?;
    let doc = store.get_or_create(&id);

    let r1 = doc.put(props(&[("name", "Alice".into()), ("age", 30i64.into())]), None)?;
    println!("Created {}", r1.id());

    let r2 = doc.put(props(&[("name", "Alice".into()), ("age", 31i64.into())]), Some(r1.id()))?;
    println!("Updated to {}", r2.id());

    match doc.put(props(&[("name", "Alicia".into())]), Some(r1.id())) {
        Ok(_) => println!("Stale write unexpectedly succeeded"),
        Err(e) => println!("Stale write rejected: {}", serde_json::to_string(&e.report())?),
    }

    let mut builder = doc.create_revision();
    builder.set_property("age", 32i64);
    let r3 = builder.save()?;
    println!("Builder saved {} with age {:?}", r3.id(), doc.property("age"));

    println!("\n=== Conflicting branches ===\n");
    let left = doc.force_insert(props(&[("branch", "left".into())]), Some(r1.id()), false)?;
    let right = doc.force_insert(props(&[("branch", "right".into())]), Some(r1.id()), false)?;
    println!("Forced {} and {}", left.id(), right.id());
    println!("Current: {:?}", doc.current_revision_id().map(|r| r.to_string()));
    for rev in doc.conflicting_revisions() {
        println!("  conflict: {}", rev.id());
    }

    println!("\n=== Tombstones ===\n");
    let tombstone = doc.delete()?;
    println!("Deleted with {} (state: {})", tombstone.id(), doc.state());
    let history: Vec<String> = doc.revision_history().iter().map(|r| r.id().to_string()).collect();
    println!("History: {}", history.join(" -> "));

    println!("\n=== Persistence ===\n");
    let storage = MemoryStorage::new();
    let written = save_document(&storage, &doc).await?;
    println!("Stored {} revisions", written);

    let other = DocumentStore::new();
    if let Some(loaded) = load_document(&other, &storage, &id).await? {
        println!(
            "Reloaded {} with current {:?}",
            loaded.id(),
            loaded.current_revision_id().map(|r| r.to_string())
        );
    }

    println!("\n=== Purge ===\n");
    doc.purge()?;
    println!("Purged; store now holds {} documents", store.len());
    let fresh = store.get_or_create(&id);
    let again = fresh.put(props(&[("name", "Alice again".into())]), None)?;
    println!("Recreated at generation {}", again.generation());

    println!("\nChange feed:");
    while let Ok(change) = changes.try_recv() {
        println!(
            "  {:?} {} {:?}{}",
            change.kind,
            change.document_id,
            change.revision_id.map(|r| r.to_string()),
            if change.in_conflict { " (conflict)" } else { "" }
        );
    }

    Ok(())
}
