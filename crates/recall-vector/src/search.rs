use recall_core::SearchHit;

/// Cosine similarity; 0 when either side has zero norm or widths differ.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() { return 0.0; }
	let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		na += x * x;
		nb += y * y;
	}
	if na == 0.0 || nb == 0.0 { return 0.0; }
	dot / (na.sqrt() * nb.sqrt())
}

/// Exhaustive top-k by cosine similarity. Equal scores keep input order.
pub fn rank_by_similarity<'a, I>(query: &[f32], candidates: I, k: usize) -> Vec<SearchHit>
where
	I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
	if k == 0 { return Vec::new(); }
	let mut scored: Vec<(&str, f32)> = candidates.into_iter().map(|(id, v)| (id, cosine(query, v))).collect();
	scored.sort_by(|a, b| b.1.total_cmp(&a.1));
	scored.truncate(k);
	scored.into_iter().map(|(id, score)| SearchHit::vector(id, score)).collect()
}
