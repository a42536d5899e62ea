//! # Category Index
//! Slab of compiled categories plus triple-key lookup maps.
//!
//! Categories live in append-only slots; removal tombstones a slot so
//! insertion order (the final tie-break) stays stable. Two key maps exist:
//! the global one, and one overlay per session for categories installed by
//! session-scoped learning. An overlay entry shadows a global entry with the
//! same triple-key for that session only.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{parse_template, Node};
use crate::error::EngineError;
use crate::pattern::{specificity, CategoryRecord, CompiledPattern, PatternToken, MAX_CAPTURES};

/// A compiled, indexed category. Immutable once inserted.
#[derive(Debug)]
pub struct Category {
    pub pattern: CompiledPattern,
    pub that: CompiledPattern,
    pub topic: CompiledPattern,
    /// Original template source, kept for persistence and diagnostics.
    pub template: String,
    /// Template AST, parsed once at insertion.
    pub nodes: Vec<Node>,
    pub specificity: i64,
    /// Owning session for session-scoped learns; `None` = global.
    pub owner: Option<String>,
    /// Insertion order, the final match tie-break.
    pub seq: u64,
    /// Fast-path key: patterns opening with a plain literal can only match
    /// inputs opening with that exact word, so the match engine skips them
    /// without a token walk. `None` means "always a candidate".
    first_key: Option<String>,
}

impl Category {
    /// Compile a parsed record. Rejects empty or malformed patterns and
    /// triples with more than [`MAX_CAPTURES`] capturing tokens.
    pub fn compile(record: &CategoryRecord, owner: Option<String>) -> Result<Self, EngineError> {
        let pattern = CompiledPattern::compile(&record.pattern)?;
        if pattern.is_empty() {
            return Err(EngineError::MalformedPattern("empty pattern".into()));
        }
        let that = CompiledPattern::compile(&record.that)?;
        let topic = CompiledPattern::compile(&record.topic)?;

        let captures = pattern.capture_count() + that.capture_count() + topic.capture_count();
        if captures > MAX_CAPTURES {
            return Err(EngineError::MalformedPattern(format!(
                "{captures} capturing tokens exceed the limit of {MAX_CAPTURES}"
            )));
        }

        let score = specificity([&pattern, &that, &topic]);
        let first_key = match pattern.tokens.first() {
            Some(PatternToken::Literal(w)) | Some(PatternToken::Exact(w)) => Some(w.clone()),
            _ => None,
        };
        Ok(Self {
            nodes: parse_template(&record.template),
            template: record.template.clone(),
            specificity: score,
            pattern,
            that,
            topic,
            owner,
            seq: 0,
            first_key,
        })
    }

    /// True when this category could match an input starting with `first`.
    pub fn admits_first_token(&self, first: &str) -> bool {
        match &self.first_key {
            Some(key) => key == first,
            None => true,
        }
    }

    /// Triple-key identifying this category within its scope.
    pub fn key(&self) -> String {
        triple_key(&self.pattern.source, &self.that.source, &self.topic.source)
    }

    /// Back to the loader-facing record form.
    pub fn record(&self) -> CategoryRecord {
        CategoryRecord {
            pattern: self.pattern.source.clone(),
            that: self.that.source.clone(),
            topic: self.topic.source.clone(),
            template: self.template.clone(),
        }
    }
}

pub fn triple_key(pattern: &str, that: &str, topic: &str) -> String {
    format!("{pattern} <THAT> {that} <TOPIC> {topic}")
}

#[derive(Debug, Default)]
pub struct CategoryIndex {
    slots: Vec<Option<Arc<Category>>>,
    global: HashMap<String, usize>,
    overlays: HashMap<String, HashMap<String, usize>>,
    next_seq: u64,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a compiled category, deduplicating by triple-key within its
    /// scope. A duplicate key replaces the stored template but keeps the
    /// original insertion order.
    pub fn insert(&mut self, mut category: Category) -> Arc<Category> {
        let key = category.key();
        let owner = category.owner.clone();
        let map = match owner {
            Some(session) => self.overlays.entry(session).or_default(),
            None => &mut self.global,
        };

        if let Some(&slot) = map.get(&key) {
            let old = self.slots[slot].as_ref().expect("keyed slot is live");
            category.seq = old.seq;
            let arc = Arc::new(category);
            self.slots[slot] = Some(arc.clone());
            arc
        } else {
            category.seq = self.next_seq;
            self.next_seq += 1;
            let arc = Arc::new(category);
            map.insert(key, self.slots.len());
            self.slots.push(Some(arc.clone()));
            arc
        }
    }

    /// Remove every category whose normalized pattern equals `pattern`,
    /// regardless of that/topic context. With a session, the session's
    /// overlay is cleared as well. Returns the number removed.
    pub fn remove_pattern(&mut self, pattern: &str, session: Option<&str>) -> usize {
        let mut removed = 0;
        removed += remove_from(&mut self.global, &mut self.slots, pattern);
        if let Some(id) = session {
            if let Some(overlay) = self.overlays.get_mut(id) {
                removed += remove_from(overlay, &mut self.slots, pattern);
            }
        }
        removed
    }

    /// Drop a session's overlay entirely (session deletion).
    pub fn drop_overlay(&mut self, session: &str) {
        if let Some(overlay) = self.overlays.remove(session) {
            for slot in overlay.into_values() {
                self.slots[slot] = None;
            }
        }
    }

    /// Categories visible to a session: all global entries not shadowed by
    /// the session's overlay, plus the overlay's own entries.
    pub fn visible(&self, session: Option<&str>) -> Vec<Arc<Category>> {
        let overlay = session.and_then(|id| self.overlays.get(id));
        let mut out = Vec::with_capacity(self.global.len());
        for (key, &slot) in &self.global {
            if overlay.is_some_and(|o| o.contains_key(key)) {
                continue;
            }
            if let Some(cat) = &self.slots[slot] {
                out.push(cat.clone());
            }
        }
        if let Some(overlay) = overlay {
            for &slot in overlay.values() {
                if let Some(cat) = &self.slots[slot] {
                    out.push(cat.clone());
                }
            }
        }
        out
    }

    /// Live category count as seen by a session.
    pub fn size(&self, session: Option<&str>) -> usize {
        self.visible(session).len()
    }

    /// Every live category across all scopes.
    pub fn iter_all(&self) -> impl Iterator<Item = &Arc<Category>> {
        self.slots.iter().flatten()
    }

    pub fn get(&self, pattern: &str, that: &str, topic: &str, session: Option<&str>) -> Option<Arc<Category>> {
        let key = triple_key(pattern, that, topic);
        if let Some(overlay) = session.and_then(|id| self.overlays.get(id)) {
            if let Some(&slot) = overlay.get(&key) {
                return self.slots[slot].clone();
            }
        }
        self.global
            .get(&key)
            .and_then(|&slot| self.slots[slot].clone())
    }
}

fn remove_from(map: &mut HashMap<String, usize>, slots: &mut [Option<Arc<Category>>], pattern: &str) -> usize {
    let keys: Vec<String> = map
        .iter()
        .filter(|(_, slot)| {
            slots[**slot]
                .as_ref()
                .is_some_and(|cat| cat.pattern.source == pattern)
        })
        .map(|(key, _)| key.clone())
        .collect();
    for key in &keys {
        if let Some(slot) = map.remove(key) {
            slots[slot] = None;
        }
    }
    keys.len()
}
