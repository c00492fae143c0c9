//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Metrics prefix for all FinRAG metrics
pub const METRICS_PREFIX: &str = "finrag";

/// Buckets for query latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of retrieval queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval query latency in seconds"
    );

    describe_counter!(
        format!("{}_records_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total records added to the vector store"
    );

    describe_gauge!(
        format!("{}_collection_records", METRICS_PREFIX),
        Unit::Count,
        "Records currently in the active collection"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding batches"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_transport_sends_total", METRICS_PREFIX),
        Unit::Count,
        "Ingestion transport attempts"
    );

    tracing::info!("Metrics registered");
}

/// Install the Prometheus exporter on `port` (0 disables it)
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(LATENCY_BUCKETS)?
        .install()?;

    register_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Helper to record query metrics
pub fn record_query(duration_secs: f64, collection: &str, result_count: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "collection" => collection.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_query_duration_seconds", METRICS_PREFIX),
            "collection" => collection.to_string()
        )
        .record(duration_secs);

        histogram!(
            format!("{}_query_results", METRICS_PREFIX),
            "collection" => collection.to_string()
        )
        .record(result_count as f64);
    }
}

/// Helper to record store writes
pub fn record_ingestion(collection: &str, added: usize, total: usize) {
    counter!(
        format!("{}_records_ingested_total", METRICS_PREFIX),
        "collection" => collection.to_string()
    )
    .increment(added as u64);

    gauge!(
        format!("{}_collection_records", METRICS_PREFIX),
        "collection" => collection.to_string()
    )
    .set(total as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);

        histogram!(
            format!("{}_embedding_batch_size", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(batch_size as f64);
    }
}

/// Helper to record an ingestion transport attempt
pub fn record_transport(sent: usize, skipped: usize, success: bool) {
    let status = if success { "success" } else { "failure" };

    counter!(
        format!("{}_transport_sends_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    counter!(format!("{}_transport_records_sent_total", METRICS_PREFIX)).increment(sent as u64);
    counter!(format!("{}_transport_records_skipped_total", METRICS_PREFIX))
        .increment(skipped as u64);
}
