use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Database Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref TEST_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "test_submissions_total",
        "Total number of test submissions",
        &["outcome"]
    )
    .unwrap();

    pub static ref PROGRESS_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "progress_writes_total",
        "Total number of progress aggregate writes",
        &["status"]
    )
    .unwrap();

    pub static ref PROGRESS_WRITE_RETRIES_TOTAL: IntCounter = register_int_counter!(
        "progress_write_retries_total",
        "Total number of retried progress aggregate writes"
    )
    .unwrap();

    pub static ref RATINGS_COMPUTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ratings_computed_total",
        "Total number of rating computations",
        &["scope"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track database operation with metrics
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

pub fn record_submission_outcome(outcome: &str) {
    TEST_SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Just verify that all metrics are properly registered
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = PROGRESS_WRITES_TOTAL.with_label_values(&["success"]).get();
    }

    #[test]
    fn test_render_metrics() {
        // Increment a counter to ensure we have some data
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("http_requests_total"));
    }
}
