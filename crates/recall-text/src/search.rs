use tracing::trace;

use recall_core::traits::TextIndexer;
use recall_core::{Document, Result, SearchHit};

use crate::index::Bm25Index;
use crate::tantivy_utils::tokenize;

/// `ln((N - df + 0.5) / (df + 0.5) + 1)`; always positive.
pub fn idf(doc_count: usize, df: usize) -> f64 {
	let n = doc_count as f64;
	let df = df as f64;
	((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

impl Bm25Index {
	/// Score every indexed document against `query`, in index order.
	/// Repeated query terms contribute once per occurrence.
	pub fn scores(&self, query: &str) -> Vec<f64> {
		let mut scores = vec![0.0f64; self.doc_ids.len()];
		if self.doc_ids.is_empty() { return scores; }
		let mut analyzer = self.analyzer.clone();
		let Self { params, avg_len, .. } = *self;
		for term in tokenize(&mut analyzer, query) {
			let Some(postings) = self.postings.get(&term) else { continue };
			let weight = idf(self.doc_ids.len(), postings.len());
			for posting in postings {
				let tf = f64::from(posting.tf);
				let len_ratio = if avg_len > 0.0 { f64::from(self.doc_lens[posting.doc]) / avg_len } else { 1.0 };
				let norm = params.k1 * (1.0 - params.b + params.b * len_ratio);
				scores[posting.doc] += weight * (tf * (params.k1 + 1.0)) / (tf + norm);
			}
		}
		scores
	}

	/// Up to `k` documents with a positive score, best first; ties keep
	/// index order.
	pub fn top_k(&self, query: &str, k: usize) -> Vec<SearchHit> {
		if k == 0 { return Vec::new(); }
		let scores = self.scores(query);
		let mut ranked: Vec<(usize, f64)> = scores.into_iter().enumerate().filter(|(_, s)| *s > 0.0).collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		ranked.truncate(k);
		trace!(query, hits = ranked.len(), "bm25 search");
		ranked.into_iter().map(|(doc, score)| SearchHit::text(self.doc_ids[doc].clone(), score as f32)).collect()
	}
}

impl TextIndexer for Bm25Index {
	fn rebuild(&mut self, documents: &[Document]) -> Result<()> {
		self.index_documents(documents);
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> { Ok(self.top_k(query, k)) }

	fn is_empty(&self) -> bool { Bm25Index::is_empty(self) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::Bm25Params;

	fn docs(contents: &[&str]) -> Vec<Document> {
		contents.iter().enumerate().map(|(i, c)| Document::new(format!("d{i}"), format!("b{i}"), *c, "manual_text")).collect()
	}

	fn index(contents: &[&str]) -> Bm25Index {
		let mut index = Bm25Index::default();
		index.index_documents(&docs(contents));
		index
	}

	#[test]
	fn idf_matches_formula() {
		assert!((idf(2, 2) - (1.0f64 / 5.0 + 1.0).ln()).abs() < 1e-12);
		assert!((idf(10, 1) - (9.5f64 / 1.5 + 1.0).ln()).abs() < 1e-12);
		assert!(idf(1, 1) > 0.0);
	}

	#[test]
	fn hand_computed_score() {
		let index = index(&["alpha beta", "beta gamma delta"]);
		let scores = index.scores("gamma");
		let avg = 2.5;
		let k1 = 1.5;
		let b = 0.75;
		let expected = idf(2, 1) * (1.0 * (k1 + 1.0)) / (1.0 + k1 * (1.0 - b + b * 3.0 / avg));
		assert_eq!(scores[0], 0.0);
		assert!((scores[1] - expected).abs() < 1e-12);
	}

	#[test]
	fn shorter_document_wins_on_equal_tf() {
		let index = index(&["beta gamma delta epsilon", "alpha beta"]);
		let hits = index.top_k("beta", 5);
		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].id, "d1");
	}

	#[test]
	fn ties_keep_insertion_order() {
		let index = index(&["beta one", "beta two", "beta three"]);
		let ids: Vec<_> = index.top_k("beta", 3).into_iter().map(|h| h.id).collect();
		assert_eq!(ids, vec!["d0", "d1", "d2"]);
	}

	#[test]
	fn unmatched_and_empty_queries_return_nothing() {
		let index = index(&["alpha beta"]);
		assert!(index.top_k("zeta", 5).is_empty());
		assert!(index.top_k("", 5).is_empty());
		assert!(index.top_k("alpha", 0).is_empty());
		assert!(Bm25Index::default().top_k("alpha", 5).is_empty());
	}

	#[test]
	fn b_zero_ignores_length() {
		let mut index = Bm25Index::new(Bm25Params { k1: 1.2, b: 0.0 }, &[]);
		index.index_documents(&docs(&["beta x x x x x x", "beta"]));
		let scores = index.scores("beta");
		assert!((scores[0] - scores[1]).abs() < 1e-12);
	}

	#[test]
	fn rebuild_replaces_previous_contents() {
		let mut index = index(&["alpha", "beta"]);
		TextIndexer::rebuild(&mut index, &docs(&["gamma"])).unwrap();
		assert_eq!(index.len(), 1);
		assert!(index.top_k("alpha", 5).is_empty());
		assert_eq!(index.document_frequency("GAMMA"), 1);
	}
}
