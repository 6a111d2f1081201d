use recall_core::config::{EmbedderKind, RetrievalSettings};
use recall_embed::{get_default_embedder, resolve_model_dir, FakeEmbedder};
use recall_core::traits::Embedder;

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = RetrievalSettings { embedder: EmbedderKind::Fake, fake_dim: 1024, ..RetrievalSettings::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.embedder_id(), "fake:d1024");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_words_are_closer_than_disjoint_ones() {
    let fake = FakeEmbedder::new(256);
    let query = fake.embed_text("Beta");
    let near = fake.embed_text("alpha beta");
    let far = fake.embed_text("delta");
    assert!(cosine(&query, &near) > cosine(&query, &far));
    assert!(cosine(&query, &near) > 0.5);
}

#[test]
fn empty_text_embeds_to_zero() {
    let fake = FakeEmbedder::new(8);
    assert!(fake.embed_text("  ,. ").iter().all(|x| *x == 0.0));
}

#[test]
fn configured_model_dir_wins() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = resolve_model_dir(Some(tmp.path())).unwrap();
    assert_eq!(dir, tmp.path());
}
