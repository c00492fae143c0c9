//! FinRAG Ingestion Pipeline
//!
//! Turns PDF files into indexed records for the retrieval API:
//! 1. Loads each page as a document
//! 2. Splits pages into overlapping chunks
//! 3. Embeds every chunk
//! 4. Sends the batch to `POST /ingest`

mod chunker;
mod client;
mod errors;
mod pdf;
mod processor;

use anyhow::Context;
use clap::Parser;
use finrag_common::{config::AppConfig, embeddings::create_embedder, telemetry, VERSION};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::chunker::ChunkingConfig;
use crate::client::IngestClient;
use crate::pdf::DocumentLoader;
use crate::processor::IngestionProcessor;

/// FinRAG ingestion - load, chunk, embed and ship PDF documents
#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(version, about, long_about = None)]
struct Args {
    /// PDF files or directories of PDFs
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Ingest endpoint (overrides ingestion.api_url)
    #[arg(long)]
    api_url: Option<String>,

    /// Chunk size in characters (overrides ingestion.chunk_size)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Chunk overlap in characters (overrides ingestion.chunk_overlap)
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Transport timeout in seconds (overrides ingestion.timeout_secs)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Run the pipeline without sending anything
    #[arg(long)]
    dry_run: bool,

    /// Load configuration from this file instead of config/
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    info!("Starting FinRAG ingestion v{}", VERSION);

    let chunking = ChunkingConfig::new(
        args.chunk_size.unwrap_or(config.ingestion.chunk_size),
        args.chunk_overlap.unwrap_or(config.ingestion.chunk_overlap),
    )?;

    // Loading a local model blocks on download and weight initialisation
    let embedding_config = config.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || create_embedder(&embedding_config)).await??;

    let client = if args.dry_run {
        None
    } else {
        let api_url = args.api_url.unwrap_or_else(|| config.ingestion.api_url.clone());
        let timeout = args
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.ingest_timeout());
        Some(IngestClient::new(api_url, timeout)?)
    };

    let processor = IngestionProcessor::new(
        DocumentLoader::default(),
        chunking,
        embedder,
        config.embedding.batch_size,
        client,
    )?;

    let report = processor.run(&args.inputs).await?;

    info!(
        documents = report.documents,
        chunks = report.chunks,
        sent = report.sent,
        "Ingestion complete"
    );
    Ok(())
}
