//! Weighted reciprocal-rank fusion of a lexical and a vector ranking.
//!
//! `score(d) = Σ_r w_r / (rank_r(d) + C)` with 1-based ranks. Weights are
//! renormalised over the retrievers that returned anything, so a single
//! non-empty list passes through in its own order. Ties keep the order of
//! first appearance, lexical list first.
use std::collections::{HashMap, HashSet};

use recall_core::config::RetrievalSettings;
use recall_core::{DocumentId, SearchHit};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    pub lexical_weight: f64,
    pub vector_weight: f64,
    /// The `C` in `w / (rank + C)`.
    pub rrf_constant: f64,
}

impl Default for FusionConfig {
    fn default() -> Self { Self { lexical_weight: 0.4, vector_weight: 0.6, rrf_constant: 60.0 } }
}

impl FusionConfig {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            lexical_weight: settings.lexical_weight,
            vector_weight: settings.vector_weight,
            rrf_constant: settings.rrf_constant,
        }
    }

    /// Weights for the retrievers that are present, summing to 1.
    /// Non-positive or non-finite totals fall back to equal shares.
    pub fn effective_weights(&self, lexical: bool, vector: bool) -> (f64, f64) {
        let l = if lexical { self.lexical_weight.max(0.0) } else { 0.0 };
        let v = if vector { self.vector_weight.max(0.0) } else { 0.0 };
        let total = l + v;
        if total > 0.0 && total.is_finite() {
            return (l / total, v / total);
        }
        match (lexical, vector) {
            (true, true) => (0.5, 0.5),
            (true, false) => (1.0, 0.0),
            (false, true) => (0.0, 1.0),
            (false, false) => (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: DocumentId,
    pub score: f64,
    /// 1-based rank in the lexical list, if present there.
    pub lexical_rank: Option<usize>,
    pub vector_rank: Option<usize>,
}

/// Drop repeated ids, keeping the first (best ranked) occurrence.
fn dedup(hits: &[SearchHit]) -> Vec<&str> {
    let mut seen = HashSet::new();
    hits.iter().map(|h| h.id.as_str()).filter(|id| seen.insert(*id)).collect()
}

/// Fuse both rankings and return at most `k` hits, best first.
pub fn fuse(lexical: &[SearchHit], vector: &[SearchHit], k: usize, config: &FusionConfig) -> Vec<FusedHit> {
    let lexical = dedup(lexical);
    let vector = dedup(vector);
    let (wl, wv) = config.effective_weights(!lexical.is_empty(), !vector.is_empty());

    let mut fused: Vec<FusedHit> = Vec::with_capacity(lexical.len() + vector.len());
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let lexical_ranks = lexical.iter().enumerate().map(|(i, id)| (*id, i + 1, wl, true));
    let vector_ranks = vector.iter().enumerate().map(|(i, id)| (*id, i + 1, wv, false));
    for (id, rank, weight, is_lexical) in lexical_ranks.chain(vector_ranks) {
        let slot = *slots.entry(id).or_insert_with(|| {
            fused.push(FusedHit { id: id.to_string(), score: 0.0, lexical_rank: None, vector_rank: None });
            fused.len() - 1
        });
        let hit = &mut fused[slot];
        hit.score += weight / (rank as f64 + config.rrf_constant);
        if is_lexical { hit.lexical_rank = Some(rank) } else { hit.vector_rank = Some(rank) }
    }

    // stable: equal scores stay in first-appearance order
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused.truncate(k);
    fused
}
