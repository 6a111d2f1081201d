use crate::error::Result;
use crate::registry::SystemEntity;
use crate::types::{Document, DocumentId, SearchHit, VectorEntry};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `bge-m3:d1024`); vectors from
    /// different ids are not comparable.
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

/// Lexical ranking structure, rebuilt wholesale from the document set.
pub trait TextIndexer: Send + Sync {
    fn rebuild(&mut self, documents: &[Document]) -> Result<()>;
    /// Up to `k` hits, best first; equal scores keep document order.
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
    fn is_empty(&self) -> bool;
}

/// Embedding + nearest-neighbour capability keyed by document id.
///
/// Mutations are not durable until `persist` returns.
pub trait VectorStore: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Insert or overwrite entries by id.
    fn upsert(&mut self, entries: Vec<VectorEntry>) -> Result<()>;
    /// Unknown ids are ignored.
    fn delete(&mut self, ids: &[DocumentId]) -> Result<()>;
    /// Up to `k` `(id, similarity)` hits, most similar first.
    fn query(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
    fn ids(&self) -> Result<Vec<DocumentId>>;
    fn persist(&mut self) -> Result<()>;
    fn len(&self) -> Result<usize> { Ok(self.ids()?.len()) }
}

impl<V: VectorStore + ?Sized> VectorStore for Box<V> {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed(texts) }
    fn upsert(&mut self, entries: Vec<VectorEntry>) -> Result<()> { (**self).upsert(entries) }
    fn delete(&mut self, ids: &[DocumentId]) -> Result<()> { (**self).delete(ids) }
    fn query(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> { (**self).query(query, k) }
    fn ids(&self) -> Result<Vec<DocumentId>> { (**self).ids() }
    fn persist(&mut self) -> Result<()> { (**self).persist() }
    fn len(&self) -> Result<usize> { (**self).len() }
}

/// Source of canonical system entities.
pub trait SystemRegistry: Send + Sync {
    fn list_systems(&self) -> Result<Vec<SystemEntity>>;
}
