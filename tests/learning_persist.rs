// tests/learning_persist.rs
//
// Learning tags end-to-end: session-scoped learn, durable learnf with the
// JSON store (schema, atomicity side effects, reload on restart), unlearn
// variants, and reference preservation inside learned templates.

use std::path::PathBuf;

use dialogue_engine::ast::Node;
use dialogue_engine::config::EngineConfig;
use dialogue_engine::engine::Engine;
use dialogue_engine::pattern::CategoryRecord;

fn record(pattern: &str, template: &str) -> CategoryRecord {
    CategoryRecord {
        pattern: pattern.into(),
        that: String::new(),
        topic: String::new(),
        template: template.into(),
    }
}

fn persistent_engine(storage: PathBuf, categories: &[(&str, &str)]) -> Engine {
    let config = EngineConfig {
        storage_path: Some(storage),
        max_backups: 2,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config);
    let records: Vec<CategoryRecord> = categories.iter().map(|(p, t)| record(p, t)).collect();
    let report = engine.load_categories(records);
    assert!(report.rejected.is_empty());
    engine
}

const TEACH_PERSISTENT: &str = "<learnf><category><pattern>MAGIC WORD</pattern><template>Please!</template></category></learnf>Saved.";

#[test]
fn learnf_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = dir.path().join("learned.json");

    let engine = persistent_engine(storage.clone(), &[("TEACH", TEACH_PERSISTENT)]);
    assert_eq!(engine.process_turn(Some("s1"), "teach").response, "Saved.");
    assert_eq!(engine.process_turn(Some("s1"), "magic word").response, "Please!");

    // A fresh engine over the same store sees the learned category.
    let reborn = persistent_engine(storage, &[]);
    assert_eq!(reborn.process_turn(Some("s2"), "magic word").response, "Please!");
}

#[test]
fn learnf_store_schema_is_complete() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = dir.path().join("learned.json");

    let engine = persistent_engine(storage.clone(), &[("TEACH", TEACH_PERSISTENT)]);
    engine.process_turn(Some("s1"), "teach");

    let raw = std::fs::read_to_string(&storage).expect("store written");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid JSON");
    assert_eq!(value["total_learned"], 1);
    assert!(value["last_updated"].is_string());
    assert!(value["version"].is_string());
    let entry = &value["categories"][0];
    assert_eq!(entry["category"]["pattern"], "MAGIC WORD");
    assert_eq!(entry["source"], "s1");
    assert!(entry["learned_at"].is_string());
    assert!(entry["checksum"].as_str().is_some_and(|c| !c.is_empty()));
}

#[test]
fn session_learn_does_not_persist_and_stays_session_scoped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = dir.path().join("learned.json");

    let engine = persistent_engine(
        storage.clone(),
        &[(
            "TEACH",
            "<learn><category><pattern>MAGIC WORD</pattern><template>Please!</template></category></learn>Noted.",
        )],
    );
    engine.process_turn(Some("s1"), "teach");
    assert!(engine.process_turn(Some("s1"), "magic word").matched);
    // Invisible to other sessions, absent from disk.
    assert!(!engine.process_turn(Some("s2"), "magic word").matched);
    assert!(!storage.exists());
}

#[test]
fn session_learn_shadows_persistent_twin_for_that_session_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = dir.path().join("learned.json");

    let engine = persistent_engine(
        storage,
        &[
            ("TEACH GLOBAL", TEACH_PERSISTENT),
            (
                "TEACH MINE",
                "<learn><category><pattern>MAGIC WORD</pattern><template>Pretty please!</template></category></learn>Noted.",
            ),
        ],
    );
    engine.process_turn(Some("s1"), "teach global");
    engine.process_turn(Some("s1"), "teach mine");

    assert_eq!(engine.process_turn(Some("s1"), "magic word").response, "Pretty please!");
    assert_eq!(engine.process_turn(Some("s2"), "magic word").response, "Please!");
}

#[test]
fn unlearn_removes_and_missing_target_is_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = persistent_engine(
        dir.path().join("learned.json"),
        &[
            ("FACT", "Known."),
            ("FORGET", "<unlearn>FACT</unlearn>Forgotten."),
        ],
    );
    assert!(engine.process_turn(Some("s1"), "fact").matched);
    assert_eq!(engine.process_turn(Some("s1"), "forget").response, "Forgotten.");
    assert!(!engine.process_turn(Some("s1"), "fact").matched);

    // Second removal finds nothing; the turn still completes.
    let outcome = engine.process_turn(Some("s1"), "forget");
    assert_eq!(outcome.response, "Forgotten.");
}

#[test]
fn unlearnf_removes_from_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = dir.path().join("learned.json");

    let engine = persistent_engine(
        storage.clone(),
        &[
            ("TEACH", TEACH_PERSISTENT),
            ("FORGET", "<unlearnf>MAGIC WORD</unlearnf>Gone."),
        ],
    );
    engine.process_turn(Some("s1"), "teach");
    assert!(engine.process_turn(Some("s1"), "magic word").matched);

    assert_eq!(engine.process_turn(Some("s1"), "forget").response, "Gone.");
    assert!(!engine.process_turn(Some("s1"), "magic word").matched);

    let reborn = persistent_engine(storage, &[]);
    assert!(!reborn.process_turn(Some("s1"), "magic word").matched);
}

#[test]
fn learned_template_keeps_reference_tags_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = persistent_engine(
        dir.path().join("learned.json"),
        &[(
            "TEACH",
            "<learn><category><pattern>GREET *</pattern><template>Hello <star/>, I am <bot name=\"name\"/></template></category></learn>ok",
        )],
    );
    engine.set_property("name", "Golem");
    engine.process_turn(Some("s1"), "teach");

    // The installed AST still holds the reference tags, unevaluated.
    {
        let kb = engine.kb().read().expect("kb lock");
        let learned = kb
            .index
            .get("GREET *", "", "", Some("s1"))
            .expect("learned category present");
        let tag_names: Vec<&str> = learned
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Element(el) => Some(el.name.as_str()),
                _ => None,
            })
            .collect();
        assert!(tag_names.contains(&"star"), "star kept: {tag_names:?}");
        assert!(tag_names.contains(&"bot"), "bot kept: {tag_names:?}");
    }

    // And they bind when the category fires.
    assert_eq!(
        engine.process_turn(Some("s1"), "greet friends").response,
        "Hello FRIENDS, I am Golem"
    );
}

#[test]
fn duplicate_learn_replaces_template() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = persistent_engine(
        dir.path().join("learned.json"),
        &[
            (
                "TEACH ONE",
                "<learn><category><pattern>ANSWER</pattern><template>one</template></category></learn>ok",
            ),
            (
                "TEACH TWO",
                "<learn><category><pattern>ANSWER</pattern><template>two</template></category></learn>ok",
            ),
        ],
    );
    engine.process_turn(Some("s1"), "teach one");
    assert_eq!(engine.process_turn(Some("s1"), "answer").response, "one");
    engine.process_turn(Some("s1"), "teach two");
    assert_eq!(engine.process_turn(Some("s1"), "answer").response, "two");
}
