//! recall-hybrid
//!
//! Lexical and vector retrieval fused into one ranking over a mutable corpus.
//! - `fusion`: weighted reciprocal-rank fusion
//! - `engine`: the single-writer retrieval engine that keeps the document
//!   store, BM25 index and vector store in step
//! - `bootstrap`: default wiring from configuration
//! - `context`: prompt-ready rendering of retrieved documents

pub mod bootstrap;
pub mod context;
pub mod engine;
pub mod fusion;

pub use bootstrap::{open_default_engine, open_vector_store, DefaultEngine};
pub use context::format_context;
pub use engine::{EngineConfig, EngineStats, HybridRetrievalEngine, MutationReport, ReconcileReport, ScoredDocument};
pub use fusion::{fuse, FusedHit, FusionConfig};
