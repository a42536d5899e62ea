//! # Engine
//! The end-to-end turn pipeline: normalize, match, evaluate, update the
//! session, commit durable learning.
//!
//! `process_turn` never fails for input-driven reasons; it always yields a
//! reply (possibly the default response) plus advisory diagnostics. The
//! knowledge base sits behind one reader/writer lock with per-operation
//! scopes; each session serializes its own turns behind its mutex.

use std::sync::{Arc, RwLock};

use metrics::{counter, gauge};
use serde::Serialize;
use tracing::info;

use crate::config::{EngineConfig, DEFAULT_FALLBACK_RESPONSE};
use crate::evaluate::{evaluate_template, Chooser, Clock, EvalContext, RandomChooser, SystemClock};
use crate::kb::{KnowledgeBase, LoadReport, MapEntry};
use crate::learning::{LearningStore, PersistentStore};
use crate::matcher::{self, MatchQuery};
use crate::normalize::normalize_input;
use crate::pattern::CategoryRecord;
use crate::services::{ServiceCache, ServiceRegistry, DEFAULT_SERVICES_PATH};
use crate::session::{SessionStore, TurnRecord};

/// Result of one processed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub response: String,
    pub matched: bool,
    /// Advisory only; never blocks the reply.
    pub diagnostics: Vec<String>,
}

pub struct Engine {
    kb: RwLock<KnowledgeBase>,
    sessions: SessionStore,
    services: RwLock<ServiceRegistry>,
    service_cache: ServiceCache,
    learning: LearningStore,
    config: EngineConfig,
    clock: Box<dyn Clock>,
    chooser: Box<dyn Chooser>,
}

impl Engine {
    /// Build an engine from config: wire persistence, reload durably
    /// learned categories, and read the service registry.
    pub fn new(config: EngineConfig) -> Self {
        let store = config
            .storage_path
            .as_ref()
            .map(|path| PersistentStore::new(path.clone(), config.max_backups));
        let learning = LearningStore::new(store);

        let mut kb = KnowledgeBase::new();
        let persisted = learning.load_persisted();
        if !persisted.is_empty() {
            let report = kb.load_categories(persisted, None);
            info!(loaded = report.loaded, rejected = report.rejected.len(), "persisted categories indexed");
        }

        let services = match &config.services_path {
            Some(path) => ServiceRegistry::load_from_file(path),
            None => ServiceRegistry::load_from_file(DEFAULT_SERVICES_PATH),
        };

        Self {
            kb: RwLock::new(kb),
            sessions: SessionStore::new(config.history_cap),
            services: RwLock::new(services),
            service_cache: ServiceCache::new(),
            learning,
            config,
            clock: Box::new(SystemClock),
            chooser: Box::new(RandomChooser),
        }
    }

    /// Swap the wall clock (tests pin date/time tags with this).
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Swap the choice source (tests make `random` deterministic).
    pub fn with_chooser(mut self, chooser: Box<dyn Chooser>) -> Self {
        self.chooser = chooser;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kb(&self) -> &RwLock<KnowledgeBase> {
        &self.kb
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn services(&self) -> &RwLock<ServiceRegistry> {
        &self.services
    }

    pub fn service_cache(&self) -> &ServiceCache {
        &self.service_cache
    }

    /// Bulk-load parsed category records (the XML loader and the HTTP
    /// surface both land here).
    pub fn load_categories(&self, records: Vec<CategoryRecord>) -> LoadReport {
        let mut kb = self.kb.write().expect("kb lock poisoned");
        let report = kb.load_categories(records, None);
        info!(loaded = report.loaded, rejected = report.rejected.len(), "categories loaded");
        gauge!("engine_categories").set(kb.index.size(None) as f64);
        report
    }

    pub fn load_set(&self, name: &str, members: Vec<String>) {
        self.kb.write().expect("kb lock poisoned").load_set(name, members);
    }

    pub fn load_map(&self, name: &str, entries: Vec<MapEntry>) {
        self.kb.write().expect("kb lock poisoned").load_map(name, entries);
    }

    pub fn set_property(&self, name: &str, value: &str) {
        self.kb.write().expect("kb lock poisoned").set_property(name, value);
    }

    /// Re-read the service registry from disk; returns the service count.
    pub fn reload_services(&self) -> usize {
        let path = self
            .config
            .services_path
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICES_PATH.into());
        let fresh = ServiceRegistry::load_from_file(path);
        let count = fresh.len();
        *self.services.write().expect("service registry lock poisoned") = fresh;
        count
    }

    /// Remove a session along with its session-scoped learned categories.
    pub fn delete_session(&self, id: &str) -> bool {
        let removed = self.sessions.delete(id);
        if removed {
            self.kb.write().expect("kb lock poisoned").index.drop_overlay(id);
        }
        removed
    }

    /// Process one conversational turn. Multi-sentence inputs match and
    /// evaluate per sentence, with the partial replies joined. Histories
    /// update only after the whole turn has evaluated, so history tags
    /// observe pre-turn state; durable learning commits after evaluation
    /// returns.
    pub fn process_turn(&self, session_id: Option<&str>, raw_input: &str) -> TurnOutcome {
        counter!("engine_turns_total").increment(1);

        let session_arc = self.sessions.create(session_id);
        let mut session = session_arc.lock().expect("session lock poisoned");

        let raw = raw_input.trim().to_string();

        let mut matched = false;
        let mut diagnostics = Vec::new();
        let mut replies: Vec<String> = Vec::new();

        for sentence in split_sentences(&raw) {
            if let Some(reply) =
                self.respond_to_sentence(&mut session, sentence, &raw, &mut diagnostics)
            {
                matched = true;
                if !reply.is_empty() {
                    replies.push(reply);
                }
            }
        }

        let response = if replies.is_empty() {
            self.default_response()
        } else {
            replies.join(" ")
        };

        session.append_request(raw.clone());
        session.append_response_tagged(response.clone(), if matched { "matched" } else { "default" });
        session.append_that(response.clone());
        session.log.push(TurnRecord {
            request: raw,
            response: response.clone(),
        });
        session.finish_turn(&self.config.pruning);

        TurnOutcome {
            session_id: session.id.clone(),
            response,
            matched,
            diagnostics,
        }
    }

    /// Match and evaluate one sentence of the turn. Returns None when
    /// nothing matched, Some(reply) otherwise (the reply may be empty for
    /// side-effect-only templates).
    fn respond_to_sentence(
        &self,
        session: &mut crate::session::Session,
        sentence: &str,
        raw_turn: &str,
        diagnostics: &mut Vec<String>,
    ) -> Option<String> {
        let normalized = normalize_input(sentence);
        if normalized.is_empty() {
            return None;
        }

        let that = session
            .thats
            .peek(1)
            .map(normalize_input)
            .unwrap_or_default();
        let topic = session.topic.clone();
        let resolved = {
            let kb = self.kb.read().expect("kb lock poisoned");
            matcher::resolve(
                &kb,
                &MatchQuery {
                    input: &normalized,
                    that: &that,
                    topic: &topic,
                    session: Some(&session.id),
                },
                &self.config.fuzzy,
            )
        };

        let Some(result) = resolved else {
            counter!("engine_no_match_total").increment(1);
            return None;
        };
        counter!("engine_matches_total").increment(1);

        let mut ctx = EvalContext::new(
            &self.kb,
            session,
            &self.services,
            &self.service_cache,
            self.clock.as_ref(),
            self.chooser.as_ref(),
            self.config.recursion_limit,
            self.config.fuzzy.clone(),
            raw_turn.to_string(),
        );
        ctx.stars = result.stars;
        ctx.that_stars = result.that_stars;
        ctx.topic_stars = result.topic_stars;

        let out = evaluate_template(&result.category.nodes, &mut ctx);
        let pending = std::mem::take(&mut ctx.pending);
        diagnostics.append(&mut ctx.diagnostics);
        drop(ctx);

        self.learning.commit(pending, self.clock.now(), diagnostics);

        Some(out.trim().to_string())
    }

    fn default_response(&self) -> String {
        if let Some(v) = self.kb.read().expect("kb lock poisoned").property("default_response") {
            return v.to_string();
        }
        self.config
            .default_response
            .clone()
            .unwrap_or_else(|| DEFAULT_FALLBACK_RESPONSE.to_string())
    }
}

/// Convenience for tests and embedding: an engine with default config.
impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Shared handle used by the HTTP layer.
pub type SharedEngine = Arc<Engine>;

/// Split a raw turn into sentences on terminal punctuation; each sentence
/// matches on its own and the replies are joined. Inputs without terminal
/// punctuation pass through whole.
fn split_sentences(raw: &str) -> Vec<&str> {
    let parts: Vec<&str> = raw
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        vec![raw]
    } else {
        parts
    }
}
