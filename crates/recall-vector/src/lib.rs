//! recall-vector
//!
//! Vector-side capability for hybrid retrieval: embedding through an
//! `Embedder`, id-keyed upsert/delete and cosine nearest-neighbour queries.
//!
//! - `FlatVectorStore`: exhaustive search, JSON file persistence (default)
//! - `LanceVectorStore`: LanceDB table, behind the `lancedb` feature
pub mod flat;
pub mod search;

#[cfg(feature = "lancedb")]
pub mod lance;
#[cfg(feature = "lancedb")]
pub mod schema;
#[cfg(feature = "lancedb")]
pub mod table;

pub use flat::{FlatVectorStore, VECTORS_FILE};
#[cfg(feature = "lancedb")]
pub use lance::LanceVectorStore;
pub use search::{cosine, rank_by_similarity};
