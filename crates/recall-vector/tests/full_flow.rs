use recall_core::traits::VectorStore;
use recall_core::{Document, VectorEntry};
use recall_embed::FakeEmbedder;
use recall_vector::{FlatVectorStore, VECTORS_FILE};
use tempfile::TempDir;

fn entries(store: &FlatVectorStore<FakeEmbedder>, docs: &[Document]) -> Vec<VectorEntry> {
    let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
    let vectors = store.embed(&texts).expect("embed");
    docs.iter().zip(vectors).map(|(d, v)| VectorEntry { id: d.id.clone(), vector: v, metadata: d.full_metadata() }).collect()
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("a1", "doc1", "alpha beta", "manual_text"),
        Document::new("a2", "doc1", "beta gamma", "manual_text"),
        Document::new("d1", "doc2", "delta epsilon", "manual_text"),
    ]
}

#[test]
fn flat_store_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let mut store = FlatVectorStore::open(tmp.path(), FakeEmbedder::new(1024)).expect("open");
    let e = entries(&store, &corpus());
    store.upsert(e).expect("upsert");
    store.persist().expect("persist");
    assert!(tmp.path().join(VECTORS_FILE).exists());

    let hits = store.query("delta", 2).expect("query");
    assert_eq!(hits[0].id, "d1");
    assert!(hits.len() <= 2);
    for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }

    let reopened = FlatVectorStore::open(tmp.path(), FakeEmbedder::new(1024)).expect("reopen");
    assert_eq!(reopened.ids().unwrap(), vec!["a1", "a2", "d1"]);
    assert_eq!(reopened.get("a2").map(|e| e.metadata.clone()), Some(corpus()[1].full_metadata()));
}

#[test]
fn other_embedder_discards_vectors() {
    let tmp = TempDir::new().expect("tmp");
    let mut store = FlatVectorStore::open(tmp.path(), FakeEmbedder::new(64)).unwrap();
    let e = entries(&store, &corpus());
    store.upsert(e).unwrap();
    store.persist().unwrap();

    let reopened = FlatVectorStore::open(tmp.path(), FakeEmbedder::new(32)).unwrap();
    assert_eq!(reopened.len().unwrap(), 0);
    assert!(reopened.is_dirty());
}

#[test]
fn persist_is_skipped_when_clean() {
    let tmp = TempDir::new().expect("tmp");
    let mut store = FlatVectorStore::open(tmp.path(), FakeEmbedder::new(8)).unwrap();
    store.persist().unwrap();
    assert!(!tmp.path().join(VECTORS_FILE).exists());
}
