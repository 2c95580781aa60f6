use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all TeachAssist metrics
const PREFIX: &str = "teachassist";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Chat Metrics
    pub static ref CHAT_TURNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_chat_turns_total"), "Total chat turns by route and model"),
        &["route", "model"]
    ).expect("Failed to create chat_turns_total metric");

    pub static ref CHAT_TURN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_chat_turn_duration_seconds"),
            "Chat turn duration in seconds, inference included"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["route"]
    ).expect("Failed to create chat_turn_duration_seconds metric");

    pub static ref CHAT_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_chat_failures_total"), "Chat turns answered with an error reply"),
        &["stage"]
    ).expect("Failed to create chat_failures_total metric");

    // Session Metrics
    pub static ref SESSIONS_ACTIVE: Gauge = Gauge::new(
        format!("{PREFIX}_sessions_active"),
        "Number of live chat sessions"
    ).expect("Failed to create sessions_active metric");

    // Process Metrics
    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CHAT_TURNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CHAT_TURN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CHAT_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SESSIONS_ACTIVE.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record one answered chat turn
pub fn record_chat_turn(route: &str, model: &str, duration: Duration) {
    CHAT_TURNS_TOTAL.with_label_values(&[route, model]).inc();

    CHAT_TURN_DURATION_SECONDS
        .with_label_values(&[route])
        .observe(duration.as_secs_f64());
}

/// Record a chat turn that came back as an error reply
pub fn record_chat_failure(stage: &str) {
    CHAT_FAILURES_TOTAL.with_label_values(&[stage]).inc();
}

/// Update active sessions count
pub fn set_active_sessions(count: usize) {
    SESSIONS_ACTIVE.set(count as f64);
}

/// Update process memory usage
pub fn update_memory_usage() {
    // Get current process memory usage
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // Parse the RSS (Resident Set Size) in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            // Convert kB to bytes
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }

    // Fallback for non-Linux systems or if reading fails
    // We'll just not update the metric
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    // Update memory usage before returning metrics
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
