//! Prometheus wiring for the engine's telemetry.
//!
//! Traffic series (`engine_turns_total`, `engine_matches_total`,
//! `engine_no_match_total`, recursion stops, learn/unlearn and service
//! counters) are emitted inline where the events happen; this module only
//! installs the recorder, seeds the static configuration gauges next to
//! them, and exposes the scrape route.

use axum::routing::get;
use axum::Router;
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::EngineConfig;

/// Install the process-wide Prometheus recorder and seed the config gauges
/// (`engine_recursion_limit`, `engine_history_cap`) so dashboards can read
/// the deployed caps next to the traffic series. Call once at startup,
/// before the first turn.
pub fn install(config: &EngineConfig) -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus recorder installed twice");

    gauge!("engine_recursion_limit").set(f64::from(config.recursion_limit));
    gauge!("engine_history_cap").set(config.history_cap as f64);

    handle
}

/// `GET /metrics` rendering the exposition text for an installed recorder.
/// Merge into the API router at startup.
pub fn exposition_route(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || std::future::ready(handle.render())))
}
