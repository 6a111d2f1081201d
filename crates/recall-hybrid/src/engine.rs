//! The hybrid retrieval engine: one document set, a lexical index rebuilt from
//! it, and a vector store kept in step, behind a single-writer lock.
//!
//! Mutations are staged against a copy of the document set while readers keep
//! serving the old state. Only the final vector apply, snapshot write and
//! state swap hold the exclusive lock, so a `retrieve` sees either the whole
//! old state or the whole new one.
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use recall_core::config::RetrievalSettings;
use recall_core::ingest::ChunkingConfig;
use recall_core::registry::{render_system_documents, SystemEntity, REGISTRY_SOURCE};
use recall_core::traits::{SystemRegistry, TextIndexer, VectorStore};
use recall_core::{Document, DocumentId, DocumentStore, Result, VectorEntry};

use crate::fusion::{fuse, FusionConfig};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fusion: FusionConfig,
    /// Where the document snapshot lives; `None` keeps everything in memory.
    pub snapshot_path: Option<PathBuf>,
    /// Serve lexical-only results when the vector side fails at query time.
    pub tolerate_vector_failure: bool,
    /// Used to render registry entities.
    pub chunking: ChunkingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fusion: FusionConfig::default(),
            snapshot_path: None,
            tolerate_vector_failure: false,
            chunking: ChunkingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            fusion: FusionConfig::from_settings(settings),
            snapshot_path: Some(settings.snapshot_path()),
            tolerate_vector_failure: settings.tolerate_vector_failure,
            chunking: ChunkingConfig::from_settings(settings),
        }
    }
}

/// What a mutation changed. Both counts zero means nothing was rebuilt or
/// written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub removed: usize,
    pub inserted: usize,
    /// Input documents dropped for a blank id or an id already present.
    pub skipped: usize,
}

impl MutationReport {
    pub fn is_noop(&self) -> bool { self.removed == 0 && self.inserted == 0 }
}

/// Repairs made to bring the vector store in line with the document set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orphans_removed: usize,
    pub embedded: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
    pub lexical_rank: Option<usize>,
    pub vector_rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub documents: usize,
    pub base_ids: usize,
    pub vectors: usize,
    pub by_source: BTreeMap<String, usize>,
}

struct EngineState<TI, VS> {
    store: DocumentStore,
    lexical: TI,
    vector: VS,
}

/// Outcome of staging a mutation against a copy of the store.
struct Staged {
    store: DocumentStore,
    removed: Vec<DocumentId>,
    inserted: Vec<Document>,
    skipped: usize,
}

pub struct HybridRetrievalEngine<TI, VS> {
    config: EngineConfig,
    writer: Mutex<()>,
    state: RwLock<EngineState<TI, VS>>,
}

impl<TI, VS> HybridRetrievalEngine<TI, VS>
where
    TI: TextIndexer + Clone,
    VS: VectorStore,
{
    /// Load the snapshot (if configured), rebuild the lexical index from it and
    /// reconcile the vector store against the loaded documents.
    pub fn open(config: EngineConfig, mut lexical: TI, vector: VS) -> Result<Self> {
        let store = match &config.snapshot_path {
            Some(path) => DocumentStore::load(path)?,
            None => DocumentStore::new(),
        };
        lexical.rebuild(store.documents())?;
        let engine = Self { config, writer: Mutex::new(()), state: RwLock::new(EngineState { store, lexical, vector }) };
        match engine.reconcile() {
            Ok(report) => debug!(?report, "startup reconciliation"),
            Err(e) if e.is_vector() && engine.config.tolerate_vector_failure => {
                warn!(error = %e, "vector store unavailable at startup, continuing lexical-only");
            }
            Err(e) => return Err(e),
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState<TI, VS>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState<TI, VS>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `docs`, skipping blank and already-present ids. With `replace`,
    /// every existing document sharing a `base_id` with the input is removed
    /// first, in the same step.
    pub fn add_documents(&self, docs: impl IntoIterator<Item = Document>, replace: bool) -> Result<MutationReport> {
        let docs: Vec<Document> = docs.into_iter().collect();
        let base_ids = if replace { distinct_base_ids(&docs) } else { Vec::new() };
        self.commit(|store| stage_replace(store, &base_ids, docs))
    }

    /// Render registry entities and make them the complete registry-derived
    /// content: groups for listed systems are replaced, registry groups for
    /// systems no longer listed are removed, other documents are untouched.
    pub fn sync_external_entities(&self, entities: &[SystemEntity]) -> Result<MutationReport> {
        let docs = render_system_documents(entities, &self.config.chunking);
        let current: HashSet<String> = entities.iter().map(SystemEntity::base_id).collect();
        self.commit(|store| {
            let mut base_ids: Vec<String> = store
                .documents()
                .iter()
                .filter(|d| d.source == REGISTRY_SOURCE && !current.contains(&d.base_id))
                .map(|d| d.base_id.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            base_ids.extend(distinct_base_ids(&docs));
            stage_replace(store, &base_ids, docs)
        })
    }

    pub fn sync_registry(&self, registry: &dyn SystemRegistry) -> Result<MutationReport> {
        let entities = registry.list_systems()?;
        self.sync_external_entities(&entities)
    }

    /// Delete whole `base_id` groups.
    pub fn remove_base_ids(&self, base_ids: &[String]) -> Result<MutationReport> {
        self.commit(|store| stage_replace(store, base_ids, Vec::new()))
    }

    /// Delete individual documents by id.
    pub fn remove_documents(&self, ids: &[DocumentId]) -> Result<MutationReport> {
        self.commit(|store| {
            let removed = store.remove_ids(ids);
            (removed, Vec::new(), 0)
        })
    }

    /// Run a staged mutation through embed, rebuild, apply and persist.
    fn commit<F>(&self, stage: F) -> Result<MutationReport>
    where
        F: FnOnce(&mut DocumentStore) -> (Vec<DocumentId>, Vec<Document>, usize),
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let (staged, lexical, vectors) = {
            let state = self.read_state();
            let mut store = state.store.clone();
            let (removed, inserted, skipped) = stage(&mut store);
            let staged = Staged { store, removed, inserted, skipped };
            if staged.removed.is_empty() && staged.inserted.is_empty() {
                debug!(skipped = staged.skipped, "mutation is a no-op");
                return Ok(MutationReport { removed: 0, inserted: 0, skipped: staged.skipped });
            }
            let texts: Vec<String> = staged.inserted.iter().map(|d| d.content.clone()).collect();
            let vectors = state.vector.embed(&texts)?;
            let mut lexical = state.lexical.clone();
            lexical.rebuild(staged.store.documents())?;
            (staged, lexical, vectors)
        };

        let entries: Vec<VectorEntry> = staged
            .inserted
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| VectorEntry { id: doc.id.clone(), vector, metadata: doc.full_metadata() })
            .collect();

        let mut state = self.write_state();
        let applied = apply_vectors(&mut state.vector, &staged.removed, entries).and_then(|()| match &self.config.snapshot_path {
            Some(path) => staged.store.save(path),
            None => Ok(()),
        });
        if let Err(e) = applied {
            error!(error = %e, "mutation failed, restoring vector store");
            // ids touched by this mutation may hold new embeddings under old ids
            let touched: HashSet<&str> =
                staged.removed.iter().map(String::as_str).chain(staged.inserted.iter().map(|d| d.id.as_str())).collect();
            let EngineState { store, vector, .. } = &mut *state;
            if let Err(rollback) = reconcile_vectors(store, vector, &touched) {
                error!(error = %rollback, "vector store rollback failed; it will be reconciled on next start");
            }
            return Err(e);
        }
        let report = MutationReport { removed: staged.removed.len(), inserted: staged.inserted.len(), skipped: staged.skipped };
        state.store = staged.store;
        state.lexical = lexical;
        info!(removed = report.removed, inserted = report.inserted, documents = state.store.len(), "mutation applied");
        Ok(report)
    }

    /// Up to `k` documents in fused order.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self.retrieve_scored(query, k)?.into_iter().map(|s| s.document).collect())
    }

    /// Like `retrieve`, keeping the fused score and per-retriever ranks.
    pub fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 { return Ok(Vec::new()); }
        let state = self.read_state();
        if state.store.is_empty() { return Ok(Vec::new()); }

        let lexical = state.lexical.search(query, k);
        let vector = state.vector.query(query, k);
        let (lexical, vector) = match (lexical, vector) {
            (Ok(l), Ok(v)) => (l, v),
            (Ok(l), Err(e)) if e.is_vector() && self.config.tolerate_vector_failure => {
                warn!(error = %e, "vector retrieval failed, serving lexical results");
                (l, Vec::new())
            }
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), Ok(v)) => {
                warn!(error = %e, "lexical retrieval failed, serving vector results");
                (Vec::new(), v)
            }
            (Err(e), Err(v)) => {
                error!(lexical = %e, vector = %v, "both retrievers failed");
                return Err(e);
            }
        };

        let fused = fuse(&lexical, &vector, usize::MAX, &self.config.fusion);
        // ids the store no longer knows are dropped before truncation
        let out: Vec<ScoredDocument> = fused
            .into_iter()
            .filter_map(|hit| {
                state.store.get(&hit.id).map(|doc| ScoredDocument {
                    document: doc.clone(),
                    score: hit.score,
                    lexical_rank: hit.lexical_rank,
                    vector_rank: hit.vector_rank,
                })
            })
            .take(k)
            .collect();
        debug!(query, lexical = lexical.len(), vector = vector.len(), returned = out.len(), "retrieve");
        Ok(out)
    }

    /// Bring the vector store in line with the document set: delete ids the
    /// store does not know and embed documents the vector store lacks.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.write_state();
        let EngineState { store, vector, .. } = &mut *state;
        reconcile_vectors(store, vector, &HashSet::new())
    }

    pub fn stats(&self) -> Result<EngineStats> {
        let state = self.read_state();
        let mut by_source = BTreeMap::new();
        for doc in state.store.documents() { *by_source.entry(doc.source.clone()).or_insert(0) += 1; }
        Ok(EngineStats {
            documents: state.store.len(),
            base_ids: state.store.base_ids().len(),
            vectors: state.vector.len()?,
            by_source,
        })
    }

    /// Copy of the current document set, in insertion order.
    pub fn documents(&self) -> Vec<Document> { self.read_state().store.documents().to_vec() }

    pub fn get(&self, id: &str) -> Option<Document> { self.read_state().store.get(id).cloned() }

    pub fn len(&self) -> usize { self.read_state().store.len() }

    pub fn is_empty(&self) -> bool { self.read_state().store.is_empty() }
}

fn distinct_base_ids(docs: &[Document]) -> Vec<String> {
    let mut seen = HashSet::new();
    docs.iter()
        .map(|d| d.base_id.as_str())
        .filter(|b| !b.trim().is_empty() && seen.insert(*b))
        .map(str::to_string)
        .collect()
}

/// Remove the listed groups, then insert `docs` in order.
fn stage_replace(store: &mut DocumentStore, base_ids: &[String], docs: Vec<Document>) -> (Vec<DocumentId>, Vec<Document>, usize) {
    let mut removed = Vec::new();
    for base_id in base_ids { removed.extend(store.remove_by_base_id(base_id)); }
    let mut inserted = Vec::new();
    let mut skipped = 0;
    for mut doc in docs {
        doc.sanitize_metadata();
        if store.insert(doc.clone()) { inserted.push(doc) } else { skipped += 1 }
    }
    (removed, inserted, skipped)
}

fn apply_vectors<VS: VectorStore>(vector: &mut VS, removed: &[DocumentId], entries: Vec<VectorEntry>) -> Result<()> {
    if !removed.is_empty() { vector.delete(removed)?; }
    if !entries.is_empty() { vector.upsert(entries)?; }
    vector.persist()
}

/// Delete vectors the store does not know and embed store documents that are
/// missing from the vector side. Ids in `reembed` are re-embedded from the
/// store's content even when a vector exists.
fn reconcile_vectors<VS: VectorStore>(
    store: &DocumentStore,
    vector: &mut VS,
    reembed: &HashSet<&str>,
) -> Result<ReconcileReport> {
    let present: Vec<DocumentId> = vector.ids()?;
    let present_set: HashSet<&str> = present.iter().map(String::as_str).collect();
    let orphans: Vec<DocumentId> = present.iter().filter(|id| !store.contains(id)).cloned().collect();
    let missing: Vec<&Document> = store
        .documents()
        .iter()
        .filter(|d| !present_set.contains(d.id.as_str()) || reembed.contains(d.id.as_str()))
        .collect();
    let report = ReconcileReport { orphans_removed: orphans.len(), embedded: missing.len() };
    if orphans.is_empty() && missing.is_empty() { return Ok(report); }

    if !orphans.is_empty() { vector.delete(&orphans)?; }
    if !missing.is_empty() {
        let texts: Vec<String> = missing.iter().map(|d| d.content.clone()).collect();
        let vectors = vector.embed(&texts)?;
        let entries = missing
            .iter()
            .zip(vectors)
            .map(|(doc, v)| VectorEntry { id: doc.id.clone(), vector: v, metadata: doc.full_metadata() })
            .collect();
        vector.upsert(entries)?;
    }
    vector.persist()?;
    warn!(orphans = report.orphans_removed, embedded = report.embedded, "vector store reconciled with document set");
    Ok(report)
}
