//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - `local`: sentence-transformers models (all-MiniLM-L6-v2 by default) run
//!   in-process on ONNX Runtime via fastembed
//! - `http`: OpenAI-compatible `/embeddings` endpoint
//! - `hashing`: word-overlap stand-in for tests and offline smoke runs; it
//!   carries no semantics
//!
//! An embedder is built once per process by [`create_embedder`] and shared as
//! `Arc<dyn Embedder>`.

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::Chunk;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use unicode_segmentation::UnicodeSegmentation;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch), in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Sentence-transformers model running in-process
pub struct LocalEmbedder {
    model: Arc<TextEmbedding>,
    name: String,
    dimension: usize,
    batch_size: usize,
}

/// fastembed model and output dimension for a configured model name.
/// The `sentence-transformers/` or `BAAI/` prefix is optional.
pub fn local_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    let short = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();
    match short.as_str() {
        "all-minilm-l6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        "all-minilm-l12-v2" => Some((EmbeddingModel::AllMiniLML12V2, 384)),
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        _ => None,
    }
}

impl LocalEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use.
    /// Blocks while the weights load.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (kind, dimension) = local_model(&config.model).ok_or_else(|| AppError::Configuration {
            message: format!("'{}' is not available to the local provider", config.model),
        })?;
        if dimension != config.dimension {
            return Err(AppError::Configuration {
                message: format!(
                    "{} produces {}-dimensional embeddings but embedding.dimension is {}",
                    config.model, dimension, config.dimension
                ),
            });
        }

        let mut options = InitOptions::new(kind).with_show_download_progress(false);
        if let Some(dir) = &config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        let model = TextEmbedding::try_new(options).map_err(|e| AppError::Embedding {
            message: format!("Failed to load {}: {}", config.model, e),
        })?;

        Ok(Self {
            model: Arc::new(model),
            name: config.model.clone(),
            dimension,
            batch_size: config.batch_size.max(1),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::Embedding {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Inference is CPU-bound
        let model = self.model.clone();
        let texts = texts.to_vec();
        let batch_size = self.batch_size;
        let embeddings = tokio::task::spawn_blocking(move || model.embed(texts, Some(batch_size)))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Embedding task failed: {}", e),
            })?
            .map_err(|e| AppError::Embedding {
                message: format!("Inference failed: {}", e),
            })?;

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic bag-of-words stand-in for a real model.
///
/// Words and word bigrams are hashed into signed buckets, then the vector is
/// L2-normalised. Identical text always maps to the identical vector; empty
/// text maps to the zero vector. Only shared words count as similarity, so
/// paraphrases score 0. Use it in tests and offline smoke runs.
pub struct HashingEmbedder {
    dimension: usize,
    model: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: format!("hashing-{}", dimension),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        let words: Vec<String> = text.unicode_words().map(|w| w.to_lowercase()).collect();

        for word in &words {
            self.accumulate(&mut vector, word.as_bytes(), 1.0);
        }
        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), 0.5);
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Client for an OpenAI-compatible embeddings endpoint
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder; the client is built once and reused
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.api_base.clone().ok_or_else(|| AppError::Configuration {
            message: "embedding.api_base is required for the http provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            input: texts,
            model: &self.model,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| AppError::Embedding {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding {
                message: format!("API error {}: {}", status, body),
            });
        }

        let mut result: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::Embedding {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        if result.data.len() != texts.len() {
            return Err(AppError::Embedding {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    result.data.len()
                ),
            });
        }

        result.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        result
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() == self.dimension {
                    Ok(d.embedding)
                } else {
                    Err(AppError::DimensionMismatch {
                        expected: self.dimension,
                        actual: d.embedding.len(),
                    })
                }
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.make_request(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::Embedding {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.make_request(texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration. The local provider loads its
/// model here, once per process.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.dimension == 0 {
        return Err(AppError::Configuration {
            message: "embedding.dimension must be greater than zero".to_string(),
        });
    }

    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "local" => Arc::new(LocalEmbedder::new(config)?),
        "http" => Arc::new(HttpEmbedder::new(config)?),
        "hashing" => {
            tracing::warn!("Hashing embedder matches shared words only; use it for offline runs");
            Arc::new(HashingEmbedder::new(config.dimension))
        }
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown embedding provider '{}'", other),
            })
        }
    };

    tracing::info!(
        provider = %config.provider,
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    Ok(embedder)
}

/// Fill in the embedding of every chunk, in place
pub async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &mut [Chunk],
    batch_size: usize,
) -> Result<()> {
    let batch_size = batch_size.max(1);

    for batch in chunks.chunks_mut(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let start = Instant::now();
        let result = embedder.embed_batch(&texts).await;
        metrics::record_embedding(
            start.elapsed().as_secs_f64(),
            embedder.model_name(),
            texts.len(),
            result.is_ok(),
        );
        let embeddings = result?;

        if embeddings.len() != batch.len() {
            return Err(AppError::Embedding {
                message: format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                ),
            });
        }

        for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
            chunk.embedding = Some(embedding);
        }
    }

    tracing::debug!(
        chunk_count = chunks.len(),
        model = %embedder.model_name(),
        "Chunks embedded"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chunk(text: &str) -> Chunk {
        Chunk {
            id: text.to_string(),
            text: text.to_string(),
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(384);
        let a = embedder.embed("Quarterly revenue grew 12%").await.unwrap();
        let b = embedder.embed("Quarterly revenue grew 12%").await.unwrap();
        assert_eq!(a.len(), 384);
        assert_eq!(a, b);

        let c = HashingEmbedder::new(384)
            .embed("Quarterly revenue grew 12%")
            .await
            .unwrap();
        assert_eq!(a, c);
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_normalized() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("operating margin expanded").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("").await.unwrap();
        assert_eq!(v, vec![0.0; 16]);
    }

    #[tokio::test]
    async fn test_similar_texts_are_closer() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.embed("revenue growth").await.unwrap();
        let near = embedder.embed("strong revenue growth this year").await.unwrap();
        let far = embedder.embed("the board appointed a new auditor").await.unwrap();

        fn dot(a: &[f32], b: &[f32]) -> f32 {
            a.iter().zip(b).map(|(x, y)| x * y).sum()
        }
        assert!(dot(&query, &near) > dot(&query, &far));
    }

    #[tokio::test]
    async fn test_embed_chunks_fills_in_place() {
        let embedder = HashingEmbedder::new(32);
        let mut chunks = vec![chunk("alpha"), chunk(""), chunk("gamma delta")];
        embed_chunks(&embedder, &mut chunks, 2).await.unwrap();

        assert!(chunks.iter().all(|c| c.embedding.as_ref().map(Vec::len) == Some(32)));
        assert_eq!(
            chunks[0].embedding.as_ref().unwrap(),
            &embedder.embed("alpha").await.unwrap()
        );
    }

    #[test]
    fn test_create_embedder_rejects_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "quantum".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_local_model_names() {
        assert!(matches!(
            local_model("sentence-transformers/all-MiniLM-L6-v2"),
            Some((EmbeddingModel::AllMiniLML6V2, 384))
        ));
        assert!(matches!(
            local_model("all-MiniLM-L6-v2"),
            Some((EmbeddingModel::AllMiniLML6V2, 384))
        ));
        assert!(matches!(
            local_model("BAAI/bge-base-en-v1.5"),
            Some((EmbeddingModel::BGEBaseENV15, 768))
        ));
        assert!(local_model("text-embedding-3-small").is_none());
    }

    #[test]
    fn test_default_config_uses_local_minilm() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "local");
        let (_, dimension) = local_model(&config.model).unwrap();
        assert_eq!(dimension, config.dimension);
    }

    #[test]
    fn test_local_provider_rejects_unknown_model_and_dimension() {
        // Both are checked before any model is loaded
        let config = EmbeddingConfig {
            model: "my-custom-model".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));

        let config = EmbeddingConfig {
            dimension: 768,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "downloads the all-MiniLM-L6-v2 ONNX model"]
    async fn test_local_embedder_relates_paraphrases() {
        let cache = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            cache_dir: Some(cache.path().to_path_buf()),
            ..EmbeddingConfig::default()
        };
        let embedder = LocalEmbedder::new(&config).unwrap();

        let texts: Vec<String> = ["revenue increased", "sales rose", "the auditor resigned", ""]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let out = embedder.embed_batch(&texts).await.unwrap();
        assert!(out.iter().all(|v| v.len() == 384 && v.iter().all(|x| x.is_finite())));

        fn cosine(a: &[f32], b: &[f32]) -> f32 {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            dot / (na * nb)
        }
        assert!(cosine(&out[0], &out[1]) > cosine(&out[0], &out[2]));
        assert!(cosine(&out[0], &out[1]) > 0.3);
    }

    #[test]
    fn test_http_provider_requires_api_base() {
        let config = EmbeddingConfig {
            provider: "http".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[tokio::test]
    async fn test_http_embedder_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0, 0.0]},
                    {"index": 0, "embedding": [1.0, 0.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            provider: "http".to_string(),
            dimension: 3,
            api_base: Some(format!("{}/v1", server.uri())),
            ..EmbeddingConfig::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        let out = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_http_embedder_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            provider: "http".to_string(),
            dimension: 384,
            api_base: Some(server.uri()),
            ..EmbeddingConfig::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        assert!(matches!(
            embedder.embed("hello").await,
            Err(AppError::DimensionMismatch { expected: 384, actual: 2 })
        ));
    }
}
