use super::*;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn deterministic_output() {
    let embedder = HashingEmbedder::default();
    let first = embedder.embed("The quick brown fox").expect("should embed");
    let second = embedder.embed("The quick brown fox").expect("should embed");
    assert_eq!(first, second);
    assert_eq!(first.len(), DEFAULT_HASHING_DIMENSION);
}

#[test]
fn batch_matches_single() {
    let embedder = HashingEmbedder::new(64);
    let texts = vec![
        "alpha beta".to_string(),
        "gamma delta epsilon".to_string(),
        "alpha beta".to_string(),
    ];

    let batch = embedder.embed_batch(&texts).expect("should embed batch");
    assert_eq!(batch.len(), 3);
    for (text, vector) in texts.iter().zip(&batch) {
        assert_eq!(&embedder.embed(text).expect("should embed"), vector);
    }
}

#[test]
fn vectors_are_normalized() {
    let embedder = HashingEmbedder::new(32);
    let vector = embedder
        .embed("retrieval augmented generation systems")
        .expect("should embed");
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn empty_text_is_zero_vector() {
    let embedder = HashingEmbedder::new(16);
    let vector = embedder.embed("  ... !!! ").expect("should embed");
    assert!(vector.iter().all(|v| *v == 0.0));
}

#[test]
fn case_and_punctuation_are_ignored() {
    let embedder = HashingEmbedder::new(128);
    let a = embedder.embed("Invoice, TOTAL amount.").expect("should embed");
    let b = embedder.embed("invoice total AMOUNT").expect("should embed");
    assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
}

#[test]
fn shared_vocabulary_scores_higher() {
    let embedder = HashingEmbedder::new(512);
    let query = embedder.embed("solar panel efficiency").expect("should embed");
    let related = embedder
        .embed("the efficiency of a solar panel depends on temperature")
        .expect("should embed");
    let unrelated = embedder
        .embed("medieval poetry and rhyming couplets")
        .expect("should embed");

    assert!(cosine(&query, &related) > cosine(&query, &unrelated));
}

#[test]
fn zero_dimension_is_clamped() {
    let embedder = HashingEmbedder::new(0);
    assert_eq!(embedder.dimension(), 1);
    assert_eq!(embedder.model_id(), "hashing-unigram-v1");
}
