//! # Knowledge Base
//! The shared root owning categories, bot properties, global variables,
//! word sets, key/value maps, named lists, and per-topic variables.
//!
//! All lookups go through this root; the engine wraps it in a single
//! reader/writer lock and keeps lock scopes per-operation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::index::{Category, CategoryIndex};
use crate::pattern::{CategoryRecord, PatternToken};

/// Ordered member list with O(1) membership, as used by `<set>` pattern
/// tokens. Members are stored uppercased.
#[derive(Debug, Clone, Default)]
pub struct WordSet {
    pub members: Vec<String>,
    lookup: HashSet<String>,
}

impl WordSet {
    pub fn new(members: impl IntoIterator<Item = String>) -> Self {
        let members: Vec<String> = members.into_iter().map(|m| m.trim().to_uppercase()).collect();
        let lookup = members.iter().cloned().collect();
        Self { members, lookup }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.lookup.contains(&word.to_uppercase())
    }
}

/// One `{key, value}` entry of a map file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: String,
    pub value: String,
}

/// Outcome of a bulk category load; rejected records carry the reason.
#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub rejected: Vec<RejectedCategory>,
}

#[derive(Debug, Serialize)]
pub struct RejectedCategory {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct KnowledgeBase {
    pub index: CategoryIndex,
    properties: HashMap<String, String>,
    globals: HashMap<String, String>,
    sets: HashMap<String, WordSet>,
    maps: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, Vec<String>>,
    topic_vars: HashMap<String, HashMap<String, String>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Properties (read-only bot constants) ----

    pub fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_lowercase(), value.to_string());
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(&name.to_lowercase()).map(String::as_str)
    }

    // ---- Global variables ----

    pub fn set_global(&mut self, name: &str, value: &str) {
        self.globals.insert(name.to_lowercase(), value.to_string());
    }

    pub fn global(&self, name: &str) -> Option<&str> {
        self.globals.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn remove_global(&mut self, name: &str) {
        self.globals.remove(&name.to_lowercase());
    }

    // ---- Topic-scoped variables ----

    pub fn set_topic_var(&mut self, topic: &str, name: &str, value: &str) {
        self.topic_vars
            .entry(topic.to_uppercase())
            .or_default()
            .insert(name.to_lowercase(), value.to_string());
    }

    pub fn topic_var(&self, topic: &str, name: &str) -> Option<&str> {
        self.topic_vars
            .get(&topic.to_uppercase())?
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    pub fn remove_topic_var(&mut self, topic: &str, name: &str) {
        if let Some(vars) = self.topic_vars.get_mut(&topic.to_uppercase()) {
            vars.remove(&name.to_lowercase());
        }
    }

    // ---- Sets ----

    pub fn load_set(&mut self, name: &str, members: impl IntoIterator<Item = String>) {
        self.sets.insert(name.to_uppercase(), WordSet::new(members));
    }

    pub fn set_contains(&self, name: &str, word: &str) -> bool {
        self.sets
            .get(&name.to_uppercase())
            .is_some_and(|set| set.contains(word))
    }

    // ---- Maps ----

    pub fn load_map(&mut self, name: &str, entries: impl IntoIterator<Item = MapEntry>) {
        let map = entries
            .into_iter()
            .map(|e| (e.key.trim().to_uppercase(), e.value))
            .collect();
        self.maps.insert(name.to_uppercase(), map);
    }

    pub fn map_lookup(&self, name: &str, key: &str) -> Option<&str> {
        self.maps
            .get(&name.to_uppercase())?
            .get(&key.trim().to_uppercase())
            .map(String::as_str)
    }

    // ---- Lists ----

    pub fn list_push(&mut self, name: &str, value: String) {
        self.lists.entry(name.to_uppercase()).or_default().push(value);
    }

    /// 1-based get, mirroring history indexing elsewhere in the engine.
    pub fn list_get(&self, name: &str, index: usize) -> Option<&str> {
        let list = self.lists.get(&name.to_uppercase())?;
        if index == 0 {
            return None;
        }
        list.get(index - 1).map(String::as_str)
    }

    pub fn list_len(&self, name: &str) -> usize {
        self.lists.get(&name.to_uppercase()).map_or(0, Vec::len)
    }

    pub fn list_clear(&mut self, name: &str) {
        self.lists.remove(&name.to_uppercase());
    }

    // ---- Categories ----

    /// Compile and index a batch of records. Rejected records are reported
    /// and skipped; loading never halts.
    pub fn load_categories(
        &mut self,
        records: impl IntoIterator<Item = CategoryRecord>,
        owner: Option<&str>,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        for record in records {
            match Category::compile(&record, owner.map(str::to_string)) {
                Ok(category) => {
                    self.index.insert(category);
                    report.loaded += 1;
                }
                Err(err) => {
                    warn!(pattern = %record.pattern, error = %err, "rejected category");
                    report.rejected.push(RejectedCategory {
                        pattern: record.pattern,
                        reason: err.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Distinct known words: literal pattern tokens plus set members.
    pub fn vocabulary(&self) -> usize {
        let mut words: HashSet<&str> = HashSet::new();
        for category in self.index.iter_all() {
            for axis in [&category.pattern, &category.that, &category.topic] {
                for token in &axis.tokens {
                    if let PatternToken::Literal(w) | PatternToken::Exact(w) = token {
                        words.insert(w);
                    }
                }
            }
        }
        for set in self.sets.values() {
            words.extend(set.members.iter().map(String::as_str));
        }
        words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pattern: &str) -> CategoryRecord {
        CategoryRecord {
            pattern: pattern.into(),
            that: String::new(),
            topic: String::new(),
            template: "x".into(),
        }
    }

    #[test]
    fn load_reports_rejections_and_continues() {
        let mut kb = KnowledgeBase::new();
        let report = kb.load_categories(
            vec![record("HELLO"), record(""), record("BYE *")],
            None,
        );
        assert_eq!(report.loaded, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(kb.index.size(None), 2);
    }

    #[test]
    fn set_membership_is_case_insensitive() {
        let mut kb = KnowledgeBase::new();
        kb.load_set("color", ["red".into(), "Blue".into()]);
        assert!(kb.set_contains("COLOR", "blue"));
        assert!(kb.set_contains("color", "RED"));
        assert!(!kb.set_contains("color", "green"));
    }

    #[test]
    fn map_lookup_normalizes_keys() {
        let mut kb = KnowledgeBase::new();
        kb.load_map(
            "capitals",
            vec![MapEntry {
                key: "france".into(),
                value: "Paris".into(),
            }],
        );
        assert_eq!(kb.map_lookup("CAPITALS", " France "), Some("Paris"));
        assert_eq!(kb.map_lookup("capitals", "spain"), None);
    }

    #[test]
    fn lists_are_one_indexed() {
        let mut kb = KnowledgeBase::new();
        kb.list_push("todo", "a".into());
        kb.list_push("todo", "b".into());
        assert_eq!(kb.list_get("TODO", 1), Some("a"));
        assert_eq!(kb.list_get("todo", 2), Some("b"));
        assert_eq!(kb.list_get("todo", 0), None);
        assert_eq!(kb.list_get("todo", 3), None);
        assert_eq!(kb.list_len("todo"), 2);
        kb.list_clear("todo");
        assert_eq!(kb.list_len("todo"), 0);
    }

    #[test]
    fn vocabulary_counts_distinct_words() {
        let mut kb = KnowledgeBase::new();
        kb.load_categories(vec![record("HELLO WORLD"), record("HELLO THERE")], None);
        kb.load_set("greetings", ["hello".into(), "hiya".into()]);
        // HELLO, WORLD, THERE, HIYA
        assert_eq!(kb.vocabulary(), 4);
    }
}
