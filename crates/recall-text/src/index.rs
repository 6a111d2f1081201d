use std::collections::HashMap;
use tantivy::tokenizer::TextAnalyzer;
use tracing::debug;

use recall_core::config::RetrievalSettings;
use recall_core::{Document, DocumentId};

use crate::tantivy_utils::{build_analyzer, tokenize, DEFAULT_STOP_WORDS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
	/// Term-frequency saturation.
	pub k1: f64,
	/// Length normalisation, 0 disables it.
	pub b: f64,
}

impl Default for Bm25Params {
	fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Posting {
	pub doc: usize,
	pub tf: u32,
}

/// In-memory BM25 index over document content.
///
/// Documents are numbered by their position in the slice passed to
/// `rebuild`, and that order breaks score ties.
#[derive(Clone)]
pub struct Bm25Index {
	pub(crate) params: Bm25Params,
	pub(crate) analyzer: TextAnalyzer,
	pub(crate) doc_ids: Vec<DocumentId>,
	pub(crate) doc_lens: Vec<u32>,
	pub(crate) postings: HashMap<String, Vec<Posting>>,
	pub(crate) avg_len: f64,
}

impl Default for Bm25Index {
	fn default() -> Self { Self::new(Bm25Params::default(), &[]) }
}

impl Bm25Index {
	pub fn new(params: Bm25Params, stop_words: &[&str]) -> Self {
		Self {
			params,
			analyzer: build_analyzer(stop_words),
			doc_ids: Vec::new(),
			doc_lens: Vec::new(),
			postings: HashMap::new(),
			avg_len: 0.0,
		}
	}

	pub fn from_settings(settings: &RetrievalSettings) -> Self {
		let params = Bm25Params { k1: settings.bm25_k1, b: settings.bm25_b };
		let stop_words: &[&str] = if settings.use_default_stop_words { DEFAULT_STOP_WORDS } else { &[] };
		Self::new(params, stop_words)
	}

	/// Replace the indexed set with `documents`.
	pub fn index_documents(&mut self, documents: &[Document]) {
		self.doc_ids.clear();
		self.doc_lens.clear();
		self.postings.clear();
		let mut total_len: u64 = 0;
		for (doc, document) in documents.iter().enumerate() {
			let terms = tokenize(&mut self.analyzer, &document.content);
			let mut freqs: HashMap<String, u32> = HashMap::new();
			for term in terms.iter() { *freqs.entry(term.clone()).or_insert(0) += 1; }
			for (term, tf) in freqs { self.postings.entry(term).or_default().push(Posting { doc, tf }); }
			let len = u32::try_from(terms.len()).unwrap_or(u32::MAX);
			total_len += u64::from(len);
			self.doc_ids.push(document.id.clone());
			self.doc_lens.push(len);
		}
		self.avg_len = if documents.is_empty() { 0.0 } else { total_len as f64 / documents.len() as f64 };
		debug!(documents = self.doc_ids.len(), terms = self.postings.len(), avg_len = self.avg_len, "bm25 index rebuilt");
	}

	pub fn len(&self) -> usize { self.doc_ids.len() }

	pub fn is_empty(&self) -> bool { self.doc_ids.is_empty() }

	/// Documents containing `term` after analysis.
	pub fn document_frequency(&self, term: &str) -> usize {
		let mut analyzer = self.analyzer.clone();
		tokenize(&mut analyzer, term)
			.first()
			.and_then(|t| self.postings.get(t))
			.map_or(0, Vec::len)
	}
}
