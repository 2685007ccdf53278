//! Metrics and observability utilities
//!
//! Prometheus counters and histograms for the two pipelines.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all Verdant metrics
pub const METRICS_PREFIX: &str = "verdant";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_chunks_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks written to the chunk store"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    describe_counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions answered"
    );

    describe_histogram!(
        format!("{}_question_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Question pipeline latency in seconds"
    );

    describe_counter!(
        format!("{}_fallback_answers_total", METRICS_PREFIX),
        Unit::Count,
        "Answers replaced by the deterministic fallback"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Record one completed ingestion
pub fn record_ingestion(duration_secs: f64, chunks_indexed: usize, file_type: &str) {
    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "file_type" => file_type.to_string()
    )
    .increment(1);

    counter!(format!("{}_chunks_indexed_total", METRICS_PREFIX)).increment(chunks_indexed as u64);

    histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        "file_type" => file_type.to_string()
    )
    .record(duration_secs);
}

/// Record one answered question
pub fn record_question(duration_secs: f64, intent: &str, fallback: bool) {
    counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        "intent" => intent.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_question_duration_seconds", METRICS_PREFIX),
        "intent" => intent.to_string()
    )
    .record(duration_secs);

    if fallback {
        counter!(format!("{}_fallback_answers_total", METRICS_PREFIX)).increment(1);
    }
}

/// Record one embedding service call
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string(),
        "batch" => batch_size.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}
