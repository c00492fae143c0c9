//! Ingestion processor
//!
//! Core pipeline: load documents, chunk them, embed the chunks and hand the
//! batch to the transport.

use crate::chunker::{chunk_documents, ChunkingConfig};
use crate::client::IngestClient;
use crate::errors::IngestionError;
use crate::pdf::DocumentLoader;
use finrag_common::embeddings::{embed_chunks, Embedder};
use finrag_common::models::{Chunk, Document};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub documents: usize,
    pub chunks: usize,
    /// `false` for a dry run
    pub sent: bool,
}

/// Ingestion processor
pub struct IngestionProcessor {
    loader: DocumentLoader,
    chunking_config: ChunkingConfig,
    embedder: Arc<dyn Embedder>,
    embedding_batch_size: usize,
    client: Option<IngestClient>,
}

impl IngestionProcessor {
    /// `client: None` runs the pipeline without transmitting (dry run)
    pub fn new(
        loader: DocumentLoader,
        chunking_config: ChunkingConfig,
        embedder: Arc<dyn Embedder>,
        embedding_batch_size: usize,
        client: Option<IngestClient>,
    ) -> Result<Self, IngestionError> {
        chunking_config.validate()?;
        Ok(Self {
            loader,
            chunking_config,
            embedder,
            embedding_batch_size,
            client,
        })
    }

    /// Load every input; directories contribute all of their PDFs
    #[instrument(skip(self, inputs), fields(inputs = inputs.len()))]
    pub async fn load(&self, inputs: &[PathBuf]) -> Result<Vec<Document>, IngestionError> {
        let mut documents = Vec::new();
        for input in inputs {
            let mut docs = if is_dir(input).await {
                self.loader.load_directory(input).await?
            } else {
                self.loader.load(input).await?
            };
            documents.append(&mut docs);
        }

        if documents.is_empty() {
            return Err(IngestionError::EmptyBatch("no documents were loaded".to_string()));
        }
        Ok(documents)
    }

    /// Chunk and embed loaded documents
    pub async fn prepare(&self, documents: &[Document]) -> Result<Vec<Chunk>, IngestionError> {
        let mut chunks = chunk_documents(documents, &self.chunking_config)?;
        if chunks.is_empty() {
            return Err(IngestionError::EmptyBatch(
                "no chunks were created from the documents".to_string(),
            ));
        }
        info!(chunk_count = chunks.len(), "Text chunked successfully");

        embed_chunks(self.embedder.as_ref(), &mut chunks, self.embedding_batch_size).await?;
        info!(model = %self.embedder.model_name(), "Chunks embedded");
        Ok(chunks)
    }

    /// Load, chunk, embed and send
    #[instrument(skip(self, inputs))]
    pub async fn run(&self, inputs: &[PathBuf]) -> Result<IngestionReport, IngestionError> {
        let documents = self.load(inputs).await?;
        let chunks = self.prepare(&documents).await?;

        let sent = match &self.client {
            Some(client) => {
                if !client.send(&chunks).await {
                    return Err(IngestionError::TransmissionFailed {
                        url: client.api_url().to_string(),
                    });
                }
                true
            }
            None => {
                warn!("Dry run, chunks not sent");
                false
            }
        };

        let report = IngestionReport {
            documents: documents.len(),
            chunks: chunks.len(),
            sent,
        };
        info!(
            documents = report.documents,
            chunks = report.chunks,
            sent = report.sent,
            "Ingestion pipeline finished"
        );
        Ok(report)
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{DocumentParser, ParsedPage};
    use finrag_common::embeddings::HashingEmbedder;
    use finrag_common::errors::Result as AppResult;
    use finrag_common::models::IndexedRecord;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Three pages, the middle one long enough to need several chunks
    struct ReportParser;

    impl DocumentParser for ReportParser {
        fn parse(&self, _path: &Path) -> AppResult<Vec<ParsedPage>> {
            Ok(vec![
                ParsedPage { number: 1, text: "Annual report 2023.".into() },
                ParsedPage {
                    number: 2,
                    text: "Revenue growth was driven by new customers. ".repeat(60),
                },
                ParsedPage { number: 3, text: "   ".into() },
            ])
        }
    }

    fn processor(client: Option<IngestClient>) -> IngestionProcessor {
        IngestionProcessor::new(
            DocumentLoader::new(Arc::new(ReportParser)),
            ChunkingConfig::default(),
            Arc::new(HashingEmbedder::new(64)),
            16,
            client,
        )
        .unwrap()
    }

    fn input(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("sample-report.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        path
    }

    #[tokio::test]
    async fn test_dry_run_embeds_every_chunk() {
        let dir = TempDir::new().unwrap();
        let processor = processor(None);

        let documents = processor.load(&[input(&dir)]).await.unwrap();
        assert_eq!(documents.len(), 3);

        let chunks = processor.prepare(&documents).await.unwrap();
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.embedding.as_ref().map(Vec::len) == Some(64)));

        let report = processor.run(&[input(&dir)]).await.unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.chunks, chunks.len());
        assert!(!report.sent);
    }

    #[tokio::test]
    async fn test_run_sends_all_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "ingested": 4,
                "collection_name": "financial_documents"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = IngestClient::new(format!("{}/ingest", server.uri()), Duration::from_secs(5)).unwrap();
        let report = processor(Some(client)).run(&[input(&dir)]).await.unwrap();
        assert!(report.sent);

        let requests = server.received_requests().await.unwrap();
        let records: Vec<IndexedRecord> = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(records.len(), report.chunks);
        assert!(records.iter().all(|r| r.metadata.contains_key("file_name")));
    }

    #[tokio::test]
    async fn test_failed_transport_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = IngestClient::new(format!("{}/ingest", server.uri()), Duration::from_secs(5)).unwrap();
        let err = processor(Some(client)).run(&[input(&dir)]).await.unwrap_err();
        assert!(matches!(err, IngestionError::TransmissionFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_input_is_not_found() {
        let err = processor(None)
            .run(&[PathBuf::from("data/raw/nope.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_directory_is_empty_batch() {
        let dir = TempDir::new().unwrap();
        let err = processor(None)
            .run(&[dir.path().to_path_buf()])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::EmptyBatch(_)));
    }
}
