//! Authoritative in-memory document set with an identity index and a JSON
//! snapshot on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Document, DocumentId, MetaValue};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    positions: HashMap<DocumentId, usize>,
}

impl DocumentStore {
    pub fn new() -> Self { Self::default() }

    /// Build a store from a list, applying the same rules as `insert`.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut store = Self::new();
        for doc in documents { store.insert(doc); }
        store
    }

    /// Append `doc` unless its id is blank or already present.
    pub fn insert(&mut self, doc: Document) -> bool {
        if !doc.has_identity() || self.positions.contains_key(&doc.id) { return false; }
        self.positions.insert(doc.id.clone(), self.documents.len());
        self.documents.push(doc);
        true
    }

    /// Remove every document in the `base_id` group, returning the removed ids
    /// in store order.
    pub fn remove_by_base_id(&mut self, base_id: &str) -> Vec<DocumentId> {
        self.remove_where(|doc| doc.base_id == base_id)
    }

    /// Remove the listed ids; unknown ids are ignored.
    pub fn remove_ids(&mut self, ids: &[DocumentId]) -> Vec<DocumentId> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.remove_where(|doc| wanted.contains(doc.id.as_str()))
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&Document) -> bool) -> Vec<DocumentId> {
        let mut removed = Vec::new();
        self.documents.retain(|doc| {
            if pred(doc) {
                removed.push(doc.id.clone());
                false
            } else {
                true
            }
        });
        if !removed.is_empty() { self.reindex(); }
        removed
    }

    fn reindex(&mut self) {
        self.positions = self.documents.iter().enumerate().map(|(i, d)| (d.id.clone(), i)).collect();
    }

    pub fn contains(&self, id: &str) -> bool { self.positions.contains_key(id) }

    pub fn get(&self, id: &str) -> Option<&Document> { self.positions.get(id).map(|&i| &self.documents[i]) }

    /// Position of `id` in insertion order.
    pub fn position(&self, id: &str) -> Option<usize> { self.positions.get(id).copied() }

    pub fn documents(&self) -> &[Document] { &self.documents }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> { self.documents.iter().map(|d| &d.id) }

    pub fn base_ids(&self) -> BTreeSet<&str> { self.documents.iter().map(|d| d.base_id.as_str()).collect() }

    /// Load a snapshot written by `save`. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot on disk, starting empty");
            return Ok(Self::new());
        }
        let raw = fs::read(path).map_err(|e| Error::persistence(path, e))?;
        let file: SnapshotFile = serde_json::from_slice(&raw)
            .map_err(|source| Error::Snapshot { path: path.to_path_buf(), source })?;
        let (mut documents, saved_at) = match file {
            SnapshotFile::Versioned(s) => (s.documents, Some(s.saved_at)),
            SnapshotFile::Legacy(items) => (items.into_iter().map(LegacyDocument::into_document).collect(), None),
        };
        let scrubbed: usize = documents.iter_mut().map(Document::sanitize_metadata).sum();
        if scrubbed > 0 {
            debug!(scrubbed, "reserved metadata keys dropped from snapshot");
        }
        let total = documents.len();
        let store = Self::from_documents(documents);
        if store.len() != total {
            debug!(dropped = total - store.len(), "snapshot contained blank or duplicate ids");
        }
        info!(path = %path.display(), documents = store.len(), ?saved_at, "snapshot loaded");
        Ok(store)
    }

    /// Rewrite the snapshot in full. The file is replaced via rename so a
    /// failed write leaves the previous snapshot intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }
        let snapshot = SnapshotRef { version: SNAPSHOT_VERSION, saved_at: Utc::now(), documents: &self.documents };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|source| Error::Snapshot { path: path.to_path_buf(), source })?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);
        fs::write(tmp, bytes).map_err(|e| Error::persistence(tmp, e))?;
        fs::rename(tmp, path).map_err(|e| Error::persistence(path, e))?;
        debug!(path = %path.display(), documents = self.documents.len(), "snapshot saved");
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    documents: &'a [Document],
}

#[derive(Deserialize)]
struct Snapshot {
    #[allow(dead_code)]
    version: u32,
    saved_at: DateTime<Utc>,
    documents: Vec<Document>,
}

/// `[{page_content, metadata: {doc_id, doc_base_id, source, chunk_index, ...}}]`,
/// the layout written by the earlier retrieval service.
#[derive(Deserialize)]
struct LegacyDocument {
    page_content: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl LegacyDocument {
    fn into_document(self) -> Document {
        let text = |key: &str| self.metadata.get(key).and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
        let chunk_index = self
            .metadata
            .get("chunk_index")
            .and_then(serde_json::Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .unwrap_or(0);
        let mut doc = Document::new(text("doc_id"), text("doc_base_id"), self.page_content.clone(), text("source"))
            .with_chunk_index(chunk_index);
        doc.extend_metadata(
            self.metadata.iter().filter_map(|(k, v)| MetaValue::from_json(v).map(|v| (k.clone(), v))),
        );
        doc
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Versioned(Snapshot),
    Legacy(Vec<LegacyDocument>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, base: &str, content: &str) -> Document { Document::new(id, base, content, "manual_text") }

    #[test]
    fn insert_is_idempotent_on_id() {
        let mut store = DocumentStore::new();
        assert!(store.insert(doc("a1", "doc1", "alpha")));
        assert!(!store.insert(doc("a1", "doc1", "changed")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a1").map(|d| d.content.as_str()), Some("alpha"));
    }

    #[test]
    fn blank_ids_are_rejected() {
        let mut store = DocumentStore::new();
        assert!(!store.insert(doc("", "doc1", "alpha")));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_by_base_id_keeps_other_groups_and_positions() {
        let mut store = DocumentStore::from_documents([
            doc("a1", "doc1", "alpha"),
            doc("b1", "doc2", "bravo"),
            doc("a2", "doc1", "beta"),
            doc("b2", "doc2", "charlie"),
        ]);
        let removed = store.remove_by_base_id("doc1");
        assert_eq!(removed, vec!["a1".to_string(), "a2".to_string()]);
        assert_eq!(store.position("b1"), Some(0));
        assert_eq!(store.position("b2"), Some(1));
        assert!(!store.contains("a2"));
        assert!(store.remove_by_base_id("missing").is_empty());
    }

    #[test]
    fn snapshot_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("bm25_index.json");
        let store = DocumentStore::from_documents([
            doc("a1", "doc1", "alpha").with_metadata("lang", "en"),
            doc("a2", "doc1", "beta").with_chunk_index(1),
        ]);
        store.save(&path).unwrap();
        let loaded = DocumentStore::load(&path).unwrap();
        assert_eq!(loaded.documents(), store.documents());
        assert!(!tmp.path().join("nested").join("bm25_index.json.tmp").exists());
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DocumentStore::load(&tmp.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn legacy_page_content_layout_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("legacy.json");
        fs::write(
            &path,
            r#"[
                {"page_content": "alpha", "metadata": {"doc_id": "bft::7::0", "doc_base_id": "bft::7", "source": "bft", "chunk_index": 0, "bft_id": "7"}},
                {"page_content": "beta", "metadata": {"doc_id": "bft::7::1", "doc_base_id": "bft::7", "source": "bft", "chunk_index": 1, "note": null}},
                {"page_content": "orphan", "metadata": {"source": "manual_text"}}
            ]"#,
        )
        .unwrap();
        let store = DocumentStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        let second = store.get("bft::7::1").unwrap();
        assert_eq!((second.base_id.as_str(), second.source.as_str(), second.chunk_index), ("bft::7", "bft", 1));
        assert!(second.metadata.is_empty());
        assert_eq!(store.get("bft::7::0").unwrap().metadata.get("bft_id"), Some(&MetaValue::Text("7".into())));
    }

    #[test]
    fn reserved_keys_are_scrubbed_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bm25_index.json");
        fs::write(
            &path,
            r#"{"version": 1, "saved_at": "2026-01-01T00:00:00Z", "documents": [
                {"id": "a1", "baseId": "doc1", "content": "alpha", "source": "bft",
                 "metadata": {"baseId": "spoofed", "doc_id": "x", "lang": "en"}}
            ]}"#,
        )
        .unwrap();
        let store = DocumentStore::load(&path).unwrap();
        let doc = store.get("a1").unwrap();
        assert_eq!(doc.metadata.keys().collect::<Vec<_>>(), vec!["lang"]);
        assert_eq!(doc.full_metadata().get("baseId").and_then(MetaValue::as_str), Some("doc1"));
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(DocumentStore::load(&path), Err(Error::Snapshot { .. })));
    }
}
