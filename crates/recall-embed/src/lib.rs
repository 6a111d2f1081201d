//! recall-embed
//!
//! Embedding backends for the vector side of retrieval:
//! - `BgeM3Embedder`: local BGE-M3 through candle
//! - `FakeEmbedder`: deterministic hashed vectors for tests and offline runs
//! - `CachedEmbedder`: content-hash memoisation over any embedder
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use recall_core::config::{EmbedderKind, RetrievalSettings};

pub mod cache;
pub mod device;
pub mod fake;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use cache::{content_hash, CacheStats, CachedEmbedder};
pub use fake::FakeEmbedder;
pub use model::{BgeM3Embedder, BGE_M3_DIM};
pub use pool::masked_mean_l2;
pub use recall_core::traits::Embedder;

/// `APP_USE_FAKE_EMBEDDINGS=1|true` forces the fake embedder.
pub fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Build the embedder named by `settings`, wrapped in a cache.
pub fn get_default_embedder(settings: &RetrievalSettings) -> Result<Box<dyn Embedder>> {
    if fake_requested_by_env() || settings.embedder == EmbedderKind::Fake {
        info!(dim = settings.fake_dim, "using FakeEmbedder");
        return Ok(Box::new(CachedEmbedder::new(FakeEmbedder::new(settings.fake_dim))));
    }
    let dir = resolve_model_dir(settings.model_path().as_deref())?;
    Ok(Box::new(CachedEmbedder::new(BgeM3Embedder::load(&dir)?)))
}

/// First existing directory among: `configured`, `$APP_MODEL_DIR`,
/// `$MODEL_DIR`, `../models/bge-m3`, `models/bge-m3`.
pub fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let mut candidates: Vec<(&str, PathBuf)> = Vec::new();
    if let Some(p) = configured { candidates.push(("config", p.to_path_buf())); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { candidates.push(("APP_MODEL_DIR", PathBuf::from(dir))); }
    if let Ok(dir) = std::env::var("MODEL_DIR") { candidates.push(("MODEL_DIR", PathBuf::from(dir))); }
    candidates.push(("default", PathBuf::from("../models/bge-m3")));
    candidates.push(("default", PathBuf::from("models/bge-m3")));
    for (origin, path) in candidates {
        if path.exists() {
            info!(origin, dir = %path.display(), "using model dir");
            return Ok(path);
        }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
