//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use axum::Router;
use axum::routing::get;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Auth flow metrics
    pub static ref CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("maglink_callbacks_total", "Auth callback requests by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref SESSION_REFRESHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("maglink_session_refreshes_total", "Session refresh attempts by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref MAGIC_LINKS_SENT_TOTAL: IntCounter = IntCounter::new(
        "maglink_magic_links_sent_total",
        "Magic-link emails requested from the provider"
    ).expect("metric can be created");
    pub static ref SIGN_OUTS_TOTAL: IntCounter = IntCounter::new(
        "maglink_sign_outs_total",
        "Completed sign-out requests"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("maglink_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(CALLBACKS_TOTAL.clone()))
        .expect("CALLBACKS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSION_REFRESHES_TOTAL.clone()))
        .expect("SESSION_REFRESHES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MAGIC_LINKS_SENT_TOTAL.clone()))
        .expect("MAGIC_LINKS_SENT_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SIGN_OUTS_TOTAL.clone()))
        .expect("SIGN_OUTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Router exposing the Prometheus text endpoint.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = String::new();
    if let Err(error) = encoder.encode_utf8(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(%error, "Failed to encode metrics");
    }
    buffer
}
