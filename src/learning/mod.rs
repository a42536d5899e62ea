//! # Learning Store
//! Applies learning-tag effects to the knowledge base and forwards the
//! persistent ones to the JSON store.
//!
//! Durable writes are deferred: the evaluator queues [`PersistEffect`]s and
//! the engine commits them only after the turn's template evaluation has
//! returned. A failed durable write keeps the in-memory effect and surfaces
//! a warning; the turn continues.

pub mod persist;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::index::Category;
use crate::kb::KnowledgeBase;
use crate::pattern::CategoryRecord;

pub use persist::{PersistentStore, DEFAULT_MAX_BACKUPS};

/// A durable side effect queued during evaluation.
#[derive(Debug, Clone)]
pub enum PersistEffect {
    Append { record: CategoryRecord, source: String },
    Remove { pattern: String },
}

/// Compile a learned record and index it. `owner` scopes the category to a
/// session; `None` installs it globally.
pub fn install_category(
    kb: &mut KnowledgeBase,
    record: &CategoryRecord,
    owner: Option<&str>,
) -> Result<CategoryRecord, EngineError> {
    let category = Category::compile(record, owner.map(str::to_string))?;
    let normalized = category.record();
    kb.index.insert(category);
    info!(scope = owner.unwrap_or("global"), "learned category installed");
    Ok(normalized)
}

/// Remove every category matching the normalized pattern. Returns how many
/// were dropped; zero is a no-op, not an error.
pub fn remove_pattern(kb: &mut KnowledgeBase, pattern: &str, session: Option<&str>) -> usize {
    let removed = kb.index.remove_pattern(pattern, session);
    if removed > 0 {
        info!(removed, "categories unlearned");
    }
    removed
}

#[derive(Debug, Default)]
pub struct LearningStore {
    store: Option<PersistentStore>,
}

impl LearningStore {
    pub fn new(store: Option<PersistentStore>) -> Self {
        Self { store }
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Records persisted by earlier runs; loaded once at startup.
    pub fn load_persisted(&self) -> Vec<CategoryRecord> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        match store.load() {
            Ok(records) => {
                info!(count = records.len(), "persisted categories reloaded");
                records
            }
            Err(err) => {
                warn!(error = %err, "could not reload persisted categories");
                Vec::new()
            }
        }
    }

    /// Flush queued effects. Failures degrade to diagnostics; the
    /// corresponding in-memory categories stay installed.
    pub fn commit(&self, effects: Vec<PersistEffect>, now: DateTime<Utc>, diagnostics: &mut Vec<String>) {
        if effects.is_empty() {
            return;
        }
        let Some(store) = &self.store else {
            diagnostics.push("persistent learning requested but no storage path is configured".into());
            return;
        };
        for effect in effects {
            let outcome = match &effect {
                PersistEffect::Append { record, source } => store.append(record, source, now),
                PersistEffect::Remove { pattern } => store.remove(pattern, now).map(|_| ()),
            };
            if let Err(err) = outcome {
                let advisory = EngineError::Persistence(err.to_string()).to_string();
                warn!(error = %err, "durable learning write failed");
                diagnostics.push(advisory);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(pattern: &str) -> CategoryRecord {
        CategoryRecord {
            pattern: pattern.into(),
            that: String::new(),
            topic: String::new(),
            template: "t".into(),
        }
    }

    #[test]
    fn install_normalizes_and_indexes() {
        let mut kb = KnowledgeBase::new();
        let normalized = install_category(&mut kb, &record("hello   there *"), None).expect("installs");
        assert_eq!(normalized.pattern, "HELLO THERE *");
        assert_eq!(kb.index.size(None), 1);
    }

    #[test]
    fn install_rejects_malformed() {
        let mut kb = KnowledgeBase::new();
        assert!(install_category(&mut kb, &record(""), None).is_err());
        assert_eq!(kb.index.size(None), 0);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut kb = KnowledgeBase::new();
        assert_eq!(remove_pattern(&mut kb, "ABSENT", None), 0);
    }

    #[test]
    fn commit_without_store_leaves_diagnostic() {
        let learning = LearningStore::new(None);
        let mut diagnostics = Vec::new();
        learning.commit(
            vec![PersistEffect::Remove { pattern: "X".into() }],
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            &mut diagnostics,
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn commit_round_trips_through_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PersistentStore::new(dir.path().join("learned.json"), 2);
        let learning = LearningStore::new(Some(store.clone()));
        let mut diagnostics = Vec::new();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        learning.commit(
            vec![PersistEffect::Append {
                record: record("HELLO"),
                source: "s1".into(),
            }],
            now,
            &mut diagnostics,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(store.load().expect("load").len(), 1);

        learning.commit(
            vec![PersistEffect::Remove { pattern: "HELLO".into() }],
            now,
            &mut diagnostics,
        );
        assert!(store.load().expect("load").is_empty());
    }
}
