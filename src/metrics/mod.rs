/// Prometheus metrics for the analysis pipeline and its model calls.
///
/// Metrics live in a dedicated registry and are exposed in text format at
/// `/metrics`.
///
/// # Example
/// ```no_run
/// use incident_oracle::metrics::{init_metrics, STAGE_FALLBACKS_TOTAL};
///
/// init_metrics().unwrap();
/// STAGE_FALLBACKS_TOTAL
///     .with_label_values(&["analyze_incident"])
///     .inc();
/// ```
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

const NAMESPACE: &str = "incident_oracle";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Completed pipeline runs
    ///
    /// Labels: outcome (complete, degraded, failed)
    pub static ref PIPELINE_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("pipeline_runs_total", "Total number of pipeline runs").namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create PIPELINE_RUNS_TOTAL metric");

    /// Per-stage wall time
    ///
    /// Labels: stage
    pub static ref STAGE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("stage_duration_seconds", "Pipeline stage duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["stage"]
    ).expect("Failed to create STAGE_DURATION_SECONDS metric");

    /// Stages that substituted a fallback artifact
    ///
    /// Labels: stage
    pub static ref STAGE_FALLBACKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("stage_fallbacks_total", "Total number of stage fallbacks").namespace(NAMESPACE),
        &["stage"]
    ).expect("Failed to create STAGE_FALLBACKS_TOTAL metric");

    /// Hits returned per retrieval
    pub static ref RETRIEVAL_RESULTS: Histogram = Histogram::with_opts(
        HistogramOpts::new("retrieval_results", "Number of incidents returned per retrieval")
            .namespace(NAMESPACE)
            .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 20.0])
    ).expect("Failed to create RETRIEVAL_RESULTS metric");

    /// Generation and embedding calls
    ///
    /// Labels: operation (generate, embed), outcome (success, error)
    pub static ref MODEL_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("model_requests_total", "Total number of model service requests")
            .namespace(NAMESPACE),
        &["operation", "outcome"]
    ).expect("Failed to create MODEL_REQUESTS_TOTAL metric");

    /// Model call latency
    ///
    /// Labels: operation
    pub static ref MODEL_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("model_request_duration_seconds", "Model service request duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["operation"]
    ).expect("Failed to create MODEL_REQUEST_DURATION_SECONDS metric");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PIPELINE_RUNS_TOTAL.clone()),
        Box::new(STAGE_DURATION_SECONDS.clone()),
        Box::new(STAGE_FALLBACKS_TOTAL.clone()),
        Box::new(RETRIEVAL_RESULTS.clone()),
        Box::new(MODEL_REQUESTS_TOTAL.clone()),
        Box::new(MODEL_REQUEST_DURATION_SECONDS.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Render all registered metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Record one model call
pub fn record_model_request(operation: &str, success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "error" };
    MODEL_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    MODEL_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}

/// Record one stage completion
pub fn record_stage(stage: &str, fallback: bool, elapsed: Duration) {
    STAGE_DURATION_SECONDS
        .with_label_values(&[stage])
        .observe(elapsed.as_secs_f64());
    if fallback {
        STAGE_FALLBACKS_TOTAL.with_label_values(&[stage]).inc();
    }
}
