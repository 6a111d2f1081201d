//! Memoising wrapper keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling the inner embedder; misses are embedded in one
//! batch and written through.

use anyhow::{ensure, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

use recall_core::traits::Embedder;

pub fn content_hash(text: &str) -> String { blake3::hash(text.as_bytes()).to_hex().to_string() }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct CachedEmbedder<E> {
    inner: E,
    entries: Mutex<HashMap<(String, String), Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self { inner, entries: Mutex::new(HashMap::new()), hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    pub fn inner(&self) -> &E { &self.inner }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }

    fn key(&self, text: &str) -> (String, String) { (content_hash(text), self.inner.embedder_id().to_string()) }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<(String, String)> = texts.iter().map(|t| self.key(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut miss_texts = Vec::new();
        let mut miss_keys: Vec<(String, String)> = Vec::new();
        {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for (text, key) in texts.iter().zip(&keys) {
                let hit = entries.get(key).cloned();
                if hit.is_none() && !miss_keys.contains(key) {
                    miss_texts.push(text.clone());
                    miss_keys.push(key.clone());
                }
                out.push(hit);
            }
        }
        let hits = out.iter().filter(|v| v.is_some()).count();
        self.hits.fetch_add(hits as u64, Ordering::Relaxed);
        self.misses.fetch_add(miss_texts.len() as u64, Ordering::Relaxed);
        trace!(hits, misses = miss_texts.len(), "embedding cache lookup");

        if !miss_texts.is_empty() {
            let fresh = self.inner.embed_batch(&miss_texts)?;
            ensure!(fresh.len() == miss_texts.len(), "embedder returned {} vectors for {} texts", fresh.len(), miss_texts.len());
            let fresh: HashMap<(String, String), Vec<f32>> = miss_keys.into_iter().zip(fresh).collect();
            for (slot, key) in out.iter_mut().zip(&keys) {
                if slot.is_none() { *slot = fresh.get(key).cloned(); }
            }
            self.entries.lock().unwrap_or_else(PoisonError::into_inner).extend(fresh);
        }
        Ok(out.into_iter().flatten().collect())
    }
}
