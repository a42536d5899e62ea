//! # Dialogue Engine — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.
//!
//! ## Endpoints
//! - `GET /health` — liveness check
//! - `POST /respond` — process one conversational turn
//! - `POST /categories` — bulk-load parsed category records
//! - `POST /sets`, `POST /maps`, `POST /properties` — load knowledge data
//! - `GET /sessions`, `GET /debug/session/{id}` — session inspection
//! - `GET /admin/reload-services` — re-read `services.json`
//! - `GET /metrics` — Prometheus exposition
//!
//! See `README.md` for quickstart.

use dialogue_engine::config::EngineConfig;
use dialogue_engine::metrics::{exposition_route, install};
use shuttle_axum::ShuttleAxum;

/// Application entrypoint for Shuttle runtime.
///
/// Builds the API router from on-disk configuration and hands it off to
/// Shuttle's deployment runtime.
#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    let _ = dotenvy::dotenv();
    // Shuttle installs its own subscriber; this only takes effect when the
    // binary runs outside that runtime (plain `cargo run`).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let config = EngineConfig::load();
    let prometheus = install(&config);

    let router = dialogue_engine::api::create_router().merge(exposition_route(prometheus));
    Ok(router.into())
}
