//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Route composition
//! - Step submission and completion per chain
//! - Pre-flight funds failures
//! - REST endpoint fallbacks

use crate::error::{SwapError, SwapResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Route metrics
    pub static ref ROUTES_COMPOSED: CounterVec = register_counter_vec!(
        "orchestrator_routes_composed_total",
        "Total routes composed by kind (cosmos, evm, composed)",
        &["kind"]
    ).unwrap();

    pub static ref MESSAGES_BUILT: CounterVec = register_counter_vec!(
        "orchestrator_messages_built_total",
        "Total chain messages built per chain",
        &["chain_id"]
    ).unwrap();

    // Execution metrics
    pub static ref STEPS_SUBMITTED: CounterVec = register_counter_vec!(
        "orchestrator_steps_submitted_total",
        "Total execution steps broadcast",
        &["chain_id"]
    ).unwrap();

    pub static ref STEPS_COMPLETED: CounterVec = register_counter_vec!(
        "orchestrator_steps_completed_total",
        "Total execution steps tracked to completion",
        &["chain_id"]
    ).unwrap();

    pub static ref STEPS_FAILED: CounterVec = register_counter_vec!(
        "orchestrator_steps_failed_total",
        "Total execution steps that failed",
        &["chain_id"]
    ).unwrap();

    pub static ref STEP_LATENCY: HistogramVec = register_histogram_vec!(
        "orchestrator_step_latency_seconds",
        "Time from signing to relay completion",
        &["chain_id"],
        vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 900.0]
    ).unwrap();

    pub static ref FUNDS_CHECK_FAILURES: CounterVec = register_counter_vec!(
        "orchestrator_funds_check_failures_total",
        "Executions blocked by the pre-flight fee check",
        &["chain_id"]
    ).unwrap();

    pub static ref EXECUTIONS: CounterVec = register_counter_vec!(
        "orchestrator_executions_total",
        "Execution attempts by outcome",
        &["outcome"]
    ).unwrap();

    // Endpoint metrics
    pub static ref ENDPOINT_FALLBACKS: CounterVec = register_counter_vec!(
        "orchestrator_endpoint_fallbacks_total",
        "Preferred REST endpoint failures that fell back to discovery",
        &["chain_id"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> SwapResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| SwapError::Internal(format!("Failed to bind metrics port: {}", e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| SwapError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_route_composed(kind: &str) {
    ROUTES_COMPOSED.with_label_values(&[kind]).inc();
}

pub fn record_message_built(chain_id: &str) {
    MESSAGES_BUILT.with_label_values(&[chain_id]).inc();
}

pub fn record_step_submitted(chain_id: &str) {
    STEPS_SUBMITTED.with_label_values(&[chain_id]).inc();
}

pub fn record_step_completed(chain_id: &str, latency_secs: f64) {
    STEPS_COMPLETED.with_label_values(&[chain_id]).inc();
    STEP_LATENCY
        .with_label_values(&[chain_id])
        .observe(latency_secs);
}

pub fn record_step_failed(chain_id: &str) {
    STEPS_FAILED.with_label_values(&[chain_id]).inc();
}

pub fn record_funds_check_failure(chain_id: &str) {
    FUNDS_CHECK_FAILURES.with_label_values(&[chain_id]).inc();
}

pub fn record_execution(outcome: &str) {
    EXECUTIONS.with_label_values(&[outcome]).inc();
}

pub fn record_endpoint_fallback(chain_id: &str) {
    ENDPOINT_FALLBACKS.with_label_values(&[chain_id]).inc();
}
