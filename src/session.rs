//! # Session Store
//! Per-conversation state: variables, topic, and the three bounded
//! request/response/that histories.
//!
//! - Histories are capacity-limited FIFOs (default 20). Index 1 is always
//!   the most recent entry at call time.
//! - Each entry carries a weight and usage counter; when pruning is
//!   enabled, weights decay geometrically per turn (0.9) and entries that
//!   sink below the floor are evicted before the cap forces them out.
//! - A turn holds its session's lock end-to-end, so concurrent turns on the
//!   same session id serialize.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_HISTORY_CAP: usize = 20;

/// Weight-decay pruning knobs; disabled by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_decay")]
    pub decay: f32,
    #[serde(default = "default_floor")]
    pub floor: f32,
}

fn default_decay() -> f32 {
    0.9
}

fn default_floor() -> f32 {
    0.1
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            decay: default_decay(),
            floor: default_floor(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub text: String,
    pub weight: f32,
    pub uses: u32,
    /// Free-form labels ("matched", "default", …) for diagnostics and
    /// pruning heuristics.
    pub tags: Vec<String>,
    /// Turn number at append time.
    pub turn: u64,
}

/// Capacity-limited FIFO with 1-based most-recent-first indexing.
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl BoundedHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(1024)),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, text: String, turn: u64) {
        self.push_tagged(text, turn, Vec::new());
    }

    pub fn push_tagged(&mut self, text: String, turn: u64, tags: Vec<String>) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            text,
            weight: 1.0,
            uses: 0,
            tags,
            turn,
        });
    }

    /// `index` 1 is the most recent entry; out of range returns None.
    pub fn get(&mut self, index: usize) -> Option<&str> {
        if index == 0 || index > self.entries.len() {
            return None;
        }
        let slot = self.entries.len() - index;
        let entry = &mut self.entries[slot];
        entry.uses += 1;
        Some(entry.text.as_str())
    }

    /// Read without touching usage counters.
    pub fn peek(&self, index: usize) -> Option<&str> {
        if index == 0 || index > self.entries.len() {
            return None;
        }
        Some(self.entries[self.entries.len() - index].text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Geometric weight decay; entries under the floor are evicted.
    pub fn decay(&mut self, factor: f32, floor: f32) {
        for entry in &mut self.entries {
            entry.weight *= factor;
        }
        self.entries.retain(|e| e.weight >= floor || e.uses > 0);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.text.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

/// One raw request/response turn, kept for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub request: String,
    pub response: String,
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub variables: HashMap<String, String>,
    pub topic: String,
    pub requests: BoundedHistory,
    pub responses: BoundedHistory,
    pub thats: BoundedHistory,
    pub turn: u64,
    pub log: Vec<TurnRecord>,
}

impl Session {
    pub fn new(id: String, history_cap: usize) -> Self {
        Self {
            id,
            variables: HashMap::new(),
            topic: String::new(),
            requests: BoundedHistory::new(history_cap),
            responses: BoundedHistory::new(history_cap),
            thats: BoundedHistory::new(history_cap),
            turn: 0,
            log: Vec::new(),
        }
    }

    pub fn set_variable(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_lowercase(), value.to_string());
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn remove_variable(&mut self, name: &str) {
        self.variables.remove(&name.to_lowercase());
    }

    pub fn append_request(&mut self, text: String) {
        let turn = self.turn;
        self.requests.push(text, turn);
    }

    pub fn append_response(&mut self, text: String) {
        let turn = self.turn;
        self.responses.push(text, turn);
    }

    /// Like [`append_response`](Self::append_response) but labeled, so the
    /// pruning heuristics can tell matched replies from default ones.
    pub fn append_response_tagged(&mut self, text: String, tag: &str) {
        let turn = self.turn;
        self.responses.push_tagged(text, turn, vec![tag.to_string()]);
    }

    pub fn append_that(&mut self, text: String) {
        let turn = self.turn;
        self.thats.push(text, turn);
    }

    pub fn get_request_by_index(&mut self, index: usize) -> Option<&str> {
        self.requests.get(index)
    }

    pub fn get_response_by_index(&mut self, index: usize) -> Option<&str> {
        self.responses.get(index)
    }

    pub fn get_that_by_index(&mut self, index: usize) -> Option<&str> {
        self.thats.get(index)
    }

    /// End-of-turn bookkeeping: advance the counter and decay weights.
    pub fn finish_turn(&mut self, pruning: &PruneConfig) {
        self.turn += 1;
        if pruning.enabled {
            self.requests.decay(pruning.decay, pruning.floor);
            self.responses.decay(pruning.decay, pruning.floor);
            self.thats.decay(pruning.decay, pruning.floor);
        }
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Registry of live sessions. `current` tracks the most recently touched
/// session for single-conversation front-ends.
#[derive(Debug)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, SharedSession>>,
    current: RwLock<Option<String>>,
    history_cap: usize,
}

impl SessionStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            history_cap,
        }
    }

    /// Create (or fetch) a session. A missing id gets a fresh UUID.
    pub fn create(&self, id: Option<&str>) -> SharedSession {
        let id = match id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let mut sessions = self.inner.write().expect("session store lock poisoned");
        let session = sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(id.clone(), self.history_cap))))
            .clone();
        *self.current.write().expect("session store lock poisoned") = Some(id);
        session
    }

    pub fn get(&self, id: &str) -> Option<SharedSession> {
        self.inner
            .read()
            .expect("session store lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = self
            .inner
            .write()
            .expect("session store lock poisoned")
            .remove(id)
            .is_some();
        let mut current = self.current.write().expect("session store lock poisoned");
        if current.as_deref() == Some(id) {
            *current = None;
        }
        removed
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .read()
            .expect("session store lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn current(&self) -> Option<SharedSession> {
        let id = self.current.read().expect("session store lock poisoned").clone()?;
        self.get(&id)
    }
}
