//! Wiring of the default engine from `[retrieval]` settings.
use tracing::info;

use recall_core::config::{RetrievalSettings, VectorBackendKind};
use recall_core::traits::{Embedder, VectorStore};
use recall_core::{Error, Result};
use recall_embed::get_default_embedder;
use recall_text::Bm25Index;
use recall_vector::FlatVectorStore;

use crate::engine::{EngineConfig, HybridRetrievalEngine};

/// BM25 over the document store plus whichever vector backend is configured.
pub type DefaultEngine = HybridRetrievalEngine<Bm25Index, Box<dyn VectorStore>>;

/// Open the vector backend named by `settings` around `embedder`.
pub fn open_vector_store(settings: &RetrievalSettings, embedder: Box<dyn Embedder>) -> Result<Box<dyn VectorStore>> {
    let dir = settings.vector_path();
    match settings.vector_backend {
        VectorBackendKind::Flat => Ok(Box::new(FlatVectorStore::open(&dir, embedder)?)),
        #[cfg(feature = "lancedb")]
        VectorBackendKind::Lancedb => {
            Ok(Box::new(recall_vector::LanceVectorStore::open(&dir, &settings.table_name, embedder)?))
        }
        #[cfg(not(feature = "lancedb"))]
        VectorBackendKind::Lancedb => {
            Err(Error::InvalidConfig("vector_backend = \"lancedb\" requires the `lancedb` feature".into()))
        }
    }
}

/// Build the engine from settings: embedder, vector backend, BM25 index and
/// the snapshot under `data_dir`.
pub fn open_default_engine(settings: &RetrievalSettings) -> Result<DefaultEngine> {
    settings.validate()?;
    let embedder = get_default_embedder(settings).map_err(|e| Error::embedding(format!("{e:#}")))?;
    info!(embedder = embedder.embedder_id(), backend = ?settings.vector_backend, "opening retrieval engine");
    let vector = open_vector_store(settings, embedder)?;
    HybridRetrievalEngine::open(EngineConfig::from_settings(settings), Bm25Index::from_settings(settings), vector)
}
