use std::fs;
use tempfile::TempDir;

use recall_core::ingest::{ChunkingConfig, DataProcessor, SOURCE_FILE_UPLOAD};
use recall_core::DocumentStore;

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "Short text\n").unwrap();

    let processor = DataProcessor::new(ChunkingConfig::default());
    let docs = processor.process_directory(tmp.path()).expect("process");

    assert_eq!(docs.len(), 1, "one small file becomes one chunk");
    assert_eq!(docs[0].content, "Short text");
    assert_eq!(docs[0].source, SOURCE_FILE_UPLOAD);
    assert_eq!(docs[0].base_id, "rag::file_upload::a.txt");
}

#[test]
fn nested_files_are_keyed_by_relative_path() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("ops/runbooks")).unwrap();
    fs::write(tmp.path().join("ops/runbooks/restart.txt"), "Restart the node. Then check health.").unwrap();
    fs::write(tmp.path().join("ignored.md"), "not text").unwrap();

    let docs = DataProcessor::new(ChunkingConfig::default()).process_directory(tmp.path()).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "rag::file_upload::ops/runbooks/restart.txt::0");
    assert_eq!(docs[0].metadata.get("file_name").and_then(|v| v.as_str()), Some("restart"));
}

#[test]
fn limit_caps_the_number_of_files() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "alpha bravo").unwrap();
    fs::write(tmp.path().join("b.txt"), "charlie delta").unwrap();

    let docs = DataProcessor::new(ChunkingConfig::default()).with_limit(1).process_directory(tmp.path()).unwrap();
    let bases: std::collections::HashSet<_> = docs.iter().map(|d| d.base_id.clone()).collect();
    assert_eq!(bases.len(), 1, "limited to one source document");
}

#[test]
fn missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = DataProcessor::default().process_directory(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, recall_core::Error::NotFound(_)));
}

#[test]
fn ingested_documents_survive_a_snapshot() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("long.txt"), "One. Two three. Four five six. ".repeat(50)).unwrap();

    let docs = DataProcessor::new(ChunkingConfig { max_tokens: 20, overlap: 5 }).process_directory(&data).unwrap();
    assert!(docs.len() > 1);
    let store = DocumentStore::from_documents(docs);
    let snapshot = tmp.path().join("bm25_index.json");
    store.save(&snapshot).unwrap();
    let reloaded = DocumentStore::load(&snapshot).unwrap();
    assert_eq!(reloaded.documents(), store.documents());
    assert_eq!(reloaded.base_ids().len(), 1);
}
