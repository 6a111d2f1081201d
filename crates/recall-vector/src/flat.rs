//! Exhaustive in-process vector store persisted as a single JSON file.
//!
//! The file records the `embedder_id` that produced its vectors. Opening it
//! with a different embedder discards the stored vectors; the engine's
//! reconciliation pass then re-embeds the corpus.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use recall_core::traits::{Embedder, VectorStore};
use recall_core::{DocumentId, Error, Result, SearchHit, VectorEntry};

use crate::search::rank_by_similarity;

pub const VECTORS_FILE: &str = "vectors.json";

#[derive(Serialize)]
struct FlatFileRef<'a> {
	embedder_id: &'a str,
	dim: usize,
	saved_at: DateTime<Utc>,
	entries: &'a [VectorEntry],
}

#[derive(Deserialize)]
struct FlatFile {
	embedder_id: String,
	dim: usize,
	entries: Vec<VectorEntry>,
}

pub struct FlatVectorStore<E> {
	embedder: E,
	path: Option<PathBuf>,
	entries: Vec<VectorEntry>,
	positions: HashMap<DocumentId, usize>,
	dirty: bool,
}

impl<E: Embedder> FlatVectorStore<E> {
	/// A store that never touches disk.
	pub fn in_memory(embedder: E) -> Self {
		Self { embedder, path: None, entries: Vec::new(), positions: HashMap::new(), dirty: false }
	}

	/// Open `dir/vectors.json`, creating nothing until the first `persist`.
	pub fn open(dir: &Path, embedder: E) -> Result<Self> {
		let path = dir.join(VECTORS_FILE);
		let mut store = Self { path: Some(path.clone()), ..Self::in_memory(embedder) };
		if !path.exists() {
			debug!(path = %path.display(), "no vector file, starting empty");
			return Ok(store);
		}
		let raw = fs::read(&path).map_err(|e| Error::persistence(&path, e))?;
		let file: FlatFile = serde_json::from_slice(&raw).map_err(|source| Error::Snapshot { path: path.clone(), source })?;
		if file.embedder_id != store.embedder.embedder_id() || file.dim != store.embedder.dim() {
			warn!(
				stored = %file.embedder_id,
				current = %store.embedder.embedder_id(),
				discarded = file.entries.len(),
				"vector file was written by another embedder"
			);
			store.dirty = true;
			return Ok(store);
		}
		store.entries = file.entries;
		store.reindex();
		info!(path = %path.display(), vectors = store.entries.len(), "vector store loaded");
		Ok(store)
	}

	pub fn embedder(&self) -> &E { &self.embedder }

	pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

	/// Unpersisted mutations pending.
	pub fn is_dirty(&self) -> bool { self.dirty }

	pub fn get(&self, id: &str) -> Option<&VectorEntry> { self.positions.get(id).map(|&i| &self.entries[i]) }

	fn reindex(&mut self) {
		self.positions = self.entries.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect();
	}

	fn check_width(&self, v: &[f32]) -> Result<()> {
		let dim = self.embedder.dim();
		if v.len() != dim {
			return Err(Error::vector(format!("vector width {} does not match embedder dim {}", v.len(), dim)));
		}
		Ok(())
	}
}

impl<E: Embedder> VectorStore for FlatVectorStore<E> {
	fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() { return Ok(Vec::new()); }
		let vectors = self.embedder.embed_batch(texts).map_err(|e| Error::embedding(format!("{e:#}")))?;
		if vectors.len() != texts.len() {
			return Err(Error::embedding(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())));
		}
		for v in &vectors { self.check_width(v).map_err(|e| Error::embedding(e.to_string()))?; }
		Ok(vectors)
	}

	fn upsert(&mut self, entries: Vec<VectorEntry>) -> Result<()> {
		for entry in &entries { self.check_width(&entry.vector)?; }
		for entry in entries {
			match self.positions.get(&entry.id) {
				Some(&i) => self.entries[i] = entry,
				None => {
					self.positions.insert(entry.id.clone(), self.entries.len());
					self.entries.push(entry);
				}
			}
			self.dirty = true;
		}
		Ok(())
	}

	fn delete(&mut self, ids: &[DocumentId]) -> Result<()> {
		let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
		let before = self.entries.len();
		self.entries.retain(|e| !wanted.contains(e.id.as_str()));
		if self.entries.len() != before {
			self.reindex();
			self.dirty = true;
		}
		Ok(())
	}

	fn query(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || self.entries.is_empty() { return Ok(Vec::new()); }
		let q = self.embed(&[query.to_string()])?.pop().unwrap_or_default();
		Ok(rank_by_similarity(&q, self.entries.iter().map(|e| (e.id.as_str(), e.vector.as_slice())), k))
	}

	fn ids(&self) -> Result<Vec<DocumentId>> { Ok(self.entries.iter().map(|e| e.id.clone()).collect()) }

	fn persist(&mut self) -> Result<()> {
		let Some(path) = self.path.clone() else {
			self.dirty = false;
			return Ok(());
		};
		if !self.dirty { return Ok(()); }
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
		}
		let file = FlatFileRef {
			embedder_id: self.embedder.embedder_id(),
			dim: self.embedder.dim(),
			saved_at: Utc::now(),
			entries: &self.entries,
		};
		let bytes = serde_json::to_vec(&file).map_err(|source| Error::Snapshot { path: path.clone(), source })?;
		let tmp = path.with_extension("json.tmp");
		fs::write(&tmp, bytes).map_err(|e| Error::persistence(&tmp, e))?;
		fs::rename(&tmp, &path).map_err(|e| Error::persistence(&path, e))?;
		self.dirty = false;
		debug!(path = %path.display(), vectors = self.entries.len(), "vector store persisted");
		Ok(())
	}

	fn len(&self) -> Result<usize> { Ok(self.entries.len()) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use recall_core::Metadata;
	use recall_embed::FakeEmbedder;

	fn entry(store: &FlatVectorStore<FakeEmbedder>, id: &str, text: &str) -> VectorEntry {
		VectorEntry { id: id.into(), vector: store.embedder().embed_text(text), metadata: Metadata::new() }
	}

	#[test]
	fn upsert_overwrites_by_id() {
		let mut store = FlatVectorStore::in_memory(FakeEmbedder::new(32));
		let a = entry(&store, "a", "alpha");
		let b = entry(&store, "a", "beta");
		store.upsert(vec![a]).unwrap();
		store.upsert(vec![b.clone()]).unwrap();
		assert_eq!(store.len().unwrap(), 1);
		assert_eq!(store.get("a").map(|e| e.vector.clone()), Some(b.vector));
	}

	#[test]
	fn rejects_wrong_width() {
		let mut store = FlatVectorStore::in_memory(FakeEmbedder::new(4));
		let bad = VectorEntry { id: "x".into(), vector: vec![1.0; 3], metadata: Metadata::new() };
		assert!(store.upsert(vec![bad]).unwrap_err().is_vector());
	}

	#[test]
	fn delete_ignores_unknown_ids() {
		let mut store = FlatVectorStore::in_memory(FakeEmbedder::new(16));
		let e = entry(&store, "a", "alpha");
		store.upsert(vec![e]).unwrap();
		store.delete(&["zzz".to_string(), "a".to_string()]).unwrap();
		assert!(store.ids().unwrap().is_empty());
		assert!(store.query("alpha", 3).unwrap().is_empty());
	}
}
