//! Prometheus metrics.

use crate::models::SkippedFile;

use lazy_static::lazy_static;
use prometheus::{self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

lazy_static! {
    // Registry for holding metric state
    pub static ref REGISTRY: Registry = Registry::new();
    // Query counter by operation and outcome
    pub static ref QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("queries_total", "The number of operations run"),
        &["operation", "outcome"]
    ).expect("valid metric definition");
    // Skipped file counter by reason
    pub static ref FILES_SKIPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("files_skipped_total", "The number of files skipped while answering queries"),
        &["reason"]
    ).expect("valid metric definition");
    // Operation duration histogram
    pub static ref QUERY_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new(
                "query_duration_seconds",
                "The time taken to run each operation"
            ),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        },
        &[],
    ).expect("valid metric definition");
}

/// Register every metric with [REGISTRY].
pub fn register_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(QUERIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FILES_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUERY_DURATION.clone()))?;
    Ok(())
}

/// Returns the metrics in the Prometheus text exposition format.
pub fn metrics_text() -> Result<String, prometheus::Error> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}

/// Record the outcome and duration of one operation.
pub fn record_query(operation: &str, outcome: &str, duration: std::time::Duration) {
    QUERIES_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    QUERY_DURATION
        .with_label_values(&[])
        .observe(duration.as_secs_f64());
}

/// Count skipped files by reason.
pub fn record_skips(skipped: &[SkippedFile]) {
    for file in skipped {
        FILES_SKIPPED_TOTAL
            .with_label_values(&[file.reason.label()])
            .inc();
    }
}
