use super::*;
use crate::config::EmbeddingConfig;

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&EmbeddingConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn model_name_matching() {
    let config = EmbeddingConfig {
        model: "nomic-embed-text".to_string(),
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");
    assert!(client.matches_model("nomic-embed-text"));
    assert!(client.matches_model("nomic-embed-text:latest"));
    assert!(!client.matches_model("nomic-embed-text:v1.5"));

    let config = EmbeddingConfig {
        model: "nomic-embed-text:v1.5".to_string(),
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");
    assert!(client.matches_model("nomic-embed-text:v1.5"));
    assert!(!client.matches_model("nomic-embed-text:latest"));
}

#[test]
fn empty_batch_skips_request() {
    let config = EmbeddingConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");
    let result = client
        .generate_embeddings_batch(&[])
        .expect("empty input should not hit the network");
    assert!(result.is_empty());
}
