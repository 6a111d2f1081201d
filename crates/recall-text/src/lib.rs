//! recall-text
//!
//! Lexical ranking for the recall engine: an in-memory BM25 index whose
//! tokenization comes from a tantivy `TextAnalyzer`. The index is rebuilt
//! wholesale from the document set; see `index` for construction and
//! `search` for scoring.
pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::{Bm25Index, Bm25Params};
pub use search::idf;
