//! Core data model and shared plumbing for the recall workspace.
//!
//! - `types`: `Document`, metadata values, search hits
//! - `store`: the authoritative document set and its JSON snapshot
//! - `traits`: seams for the lexical index, vector capability, embedder and registry
//! - `ingest` / `registry`: turning raw text and system entities into documents
//! - `config` / `error`: figment-backed settings and the error taxonomy

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod registry;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use store::DocumentStore;
pub use types::{Document, DocumentId, MetaValue, Metadata, SearchHit, SourceKind, VectorEntry};
