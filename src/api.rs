//! # HTTP API Layer
//! Axum surface over the engine: conversational turns, category/set/map
//! loading (the on-disk XML loader lives outside this crate and posts
//! parsed records here), session inspection, and admin reloads.
//!
//! The interpreter core is synchronous, so turn processing runs under
//! `spawn_blocking` to keep the async workers free.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::EngineConfig;
use crate::engine::{Engine, TurnOutcome};
use crate::kb::{LoadReport, MapEntry};
use crate::pattern::CategoryRecord;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Build the router around an existing engine.
pub fn router(engine: Arc<Engine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/respond", post(respond))
        .route("/categories", post(load_categories))
        .route("/sets", post(load_set))
        .route("/maps", post(load_map))
        .route("/properties", post(set_property))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", delete(delete_session))
        .route("/debug/session/{id}", get(debug_session))
        .route("/admin/reload-services", get(reload_services))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Build the same router the binary uses, from config files on disk.
pub fn create_router() -> Router {
    let config = EngineConfig::load();
    router(Arc::new(Engine::new(config)))
}

#[derive(Deserialize)]
struct RespondReq {
    #[serde(default)]
    session_id: Option<String>,
    input: String,
}

async fn respond(State(state): State<AppState>, Json(body): Json<RespondReq>) -> Json<TurnOutcome> {
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.process_turn(body.session_id.as_deref(), &body.input)
    })
    .await
    .unwrap_or_else(|_| TurnOutcome {
        session_id: String::new(),
        response: String::new(),
        matched: false,
        diagnostics: vec!["turn processing panicked".into()],
    });
    Json(outcome)
}

async fn load_categories(
    State(state): State<AppState>,
    Json(records): Json<Vec<CategoryRecord>>,
) -> Json<LoadReport> {
    Json(state.engine.load_categories(records))
}

#[derive(Deserialize)]
struct SetPayload {
    name: String,
    members: Vec<String>,
}

async fn load_set(State(state): State<AppState>, Json(body): Json<SetPayload>) -> StatusCode {
    state.engine.load_set(&body.name, body.members);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct MapPayload {
    name: String,
    entries: Vec<MapEntry>,
}

async fn load_map(State(state): State<AppState>, Json(body): Json<MapPayload>) -> StatusCode {
    state.engine.load_map(&body.name, body.entries);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct PropertyPayload {
    name: String,
    value: String,
}

async fn set_property(State(state): State<AppState>, Json(body): Json<PropertyPayload>) -> StatusCode {
    state.engine.set_property(&body.name, &body.value);
    StatusCode::NO_CONTENT
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.sessions().list())
}

/// Deleting a session also drops its session-scoped learned categories.
async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.engine.delete_session(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Serialize)]
struct SessionSnapshot {
    id: String,
    topic: String,
    turn: u64,
    variables: usize,
    requests: Vec<String>,
    responses: Vec<String>,
}

async fn debug_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let session = state.engine.sessions().get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let session = session.lock().expect("session lock poisoned");
    Ok(Json(SessionSnapshot {
        id: session.id.clone(),
        topic: session.topic.clone(),
        turn: session.turn,
        variables: session.variables.len(),
        requests: session.requests.snapshot(),
        responses: session.responses.snapshot(),
    }))
}

#[derive(Serialize)]
struct ReloadResult {
    services: usize,
}

async fn reload_services(State(state): State<AppState>) -> Json<ReloadResult> {
    Json(ReloadResult {
        services: state.engine.reload_services(),
    })
}
