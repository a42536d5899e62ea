// tests/evaluator_tags.rs
//
// Tag semantics through full turns: variable scopes, selection tags,
// collections, transforms, system tags, and unknown-tag passthrough.

use chrono::TimeZone;
use chrono::Utc;
use dialogue_engine::config::EngineConfig;
use dialogue_engine::engine::Engine;
use dialogue_engine::evaluate::{FixedChooser, FixedClock};
use dialogue_engine::kb::MapEntry;
use dialogue_engine::pattern::CategoryRecord;

fn record(pattern: &str, template: &str) -> CategoryRecord {
    CategoryRecord {
        pattern: pattern.into(),
        that: String::new(),
        topic: String::new(),
        template: template.into(),
    }
}

fn engine_with(categories: &[(&str, &str)]) -> Engine {
    let engine = Engine::new(EngineConfig::default());
    let records: Vec<CategoryRecord> = categories.iter().map(|(p, t)| record(p, t)).collect();
    let report = engine.load_categories(records);
    assert!(report.rejected.is_empty(), "fixture categories must load");
    engine
}

fn reply(engine: &Engine, input: &str) -> String {
    engine.process_turn(Some("s1"), input).response
}

// ---- Variable scopes ----

#[test]
fn innermost_scope_wins_and_deletion_reveals_outer() {
    let engine = engine_with(&[
        ("LOCAL", "<var name=\"color\">local</var>[<get name=\"color\"/>]"),
        ("READ", "[<get name=\"color\"/>]"),
    ]);
    engine.set_property("color", "property");
    engine
        .kb()
        .write()
        .expect("kb lock")
        .set_global("color", "global");

    // Local beats everything, but only within its own template call.
    assert_eq!(reply(&engine, "local"), "[local]");

    // Session beats topic/global/property.
    let session = engine.sessions().create(Some("s1"));
    session.lock().expect("lock").set_variable("color", "session");
    {
        let mut kb = engine.kb().write().expect("kb lock");
        kb.set_topic_var("PAINT", "color", "topic");
    }
    session.lock().expect("lock").topic = "PAINT".into();
    assert_eq!(reply(&engine, "read"), "[session]");

    session.lock().expect("lock").remove_variable("color");
    assert_eq!(reply(&engine, "read"), "[topic]");

    engine.kb().write().expect("kb lock").remove_topic_var("PAINT", "color");
    assert_eq!(reply(&engine, "read"), "[global]");

    engine.kb().write().expect("kb lock").remove_global("color");
    assert_eq!(reply(&engine, "read"), "[property]");
}

#[test]
fn set_writes_session_scope_and_emits_nothing() {
    let engine = engine_with(&[
        ("REMEMBER *", "<set name=\"thing\"><star/></set>Noted."),
        ("RECALL", "You said <get name=\"thing\"/>."),
    ]);
    assert_eq!(reply(&engine, "remember apples"), "Noted.");
    assert_eq!(reply(&engine, "recall"), "You said APPLES.");
}

#[test]
fn missing_variable_reads_empty() {
    let engine = engine_with(&[("READ", "[<get name=\"nothing\"/>]")]);
    assert_eq!(reply(&engine, "read"), "[]");
}

#[test]
fn think_hides_output_but_keeps_side_effects() {
    let engine = engine_with(&[
        ("PLAN", "<think><set name=\"mood\">good</set></think>Okay."),
        ("MOOD", "<get name=\"mood\"/>"),
    ]);
    assert_eq!(reply(&engine, "plan"), "Okay.");
    assert_eq!(reply(&engine, "mood"), "good");
}

// ---- Selection ----

#[test]
fn random_is_deterministic_with_fixed_chooser() {
    let engine = Engine::new(EngineConfig::default()).with_chooser(Box::new(FixedChooser(1)));
    engine.load_categories(vec![record(
        "PICK",
        "<random><li>alpha</li><li>beta</li><li>gamma</li></random>",
    )]);
    assert_eq!(reply(&engine, "pick"), "beta");
}

#[test]
fn condition_loop_reruns_until_branch_changes() {
    let engine = engine_with(&[(
        "COUNTDOWN",
        "<condition name=\"state\"><li value=\"done\">Finished.</li><li>step <set name=\"state\">done</set><loop/></li></condition>",
    )]);
    // First pass takes the default branch, flips the variable, and loops;
    // the second pass lands on the terminal branch.
    assert_eq!(reply(&engine, "countdown"), "step Finished.");
}

#[test]
fn condition_li_may_test_its_own_predicate() {
    let engine = engine_with(&[(
        "STATUS",
        "<condition name=\"mood\"><li value=\"happy\">Smiling.</li><li name=\"weather\" value=\"rainy\">Soggy.</li><li>Unknown.</li></condition>",
    )]);
    let session = engine.sessions().create(Some("s1"));
    session.lock().expect("lock").set_variable("weather", "rainy");
    assert_eq!(reply(&engine, "status"), "Soggy.");
}

#[test]
fn condition_single_branch_form() {
    let engine = engine_with(&[(
        "CHECK",
        "<condition name=\"flag\" value=\"on\">enabled</condition>done",
    )]);
    assert_eq!(reply(&engine, "check"), "done");

    let session = engine.sessions().create(Some("s1"));
    session.lock().expect("lock").set_variable("flag", "ON");
    assert_eq!(reply(&engine, "check"), "enableddone");
}

// ---- Collections ----

#[test]
fn map_lookup_and_miss_passthrough() {
    let engine = engine_with(&[("CAPITAL OF *", "<map name=\"capitals\"><star/></map>")]);
    engine.load_map(
        "capitals",
        vec![MapEntry {
            key: "FRANCE".into(),
            value: "Paris".into(),
        }],
    );
    assert_eq!(reply(&engine, "capital of france"), "Paris");
    assert_eq!(reply(&engine, "capital of atlantis"), "ATLANTIS");
}

#[test]
fn list_operations_round_trip() {
    let engine = engine_with(&[
        ("ADD *", "<list name=\"todo\" operation=\"add\"><star/></list>Added."),
        ("COUNT TASKS", "<list name=\"todo\" operation=\"size\"/>"),
        ("FIRST TASK", "<list name=\"todo\" operation=\"get\" index=\"1\"/>"),
        ("CLEAR TASKS", "<list name=\"todo\" operation=\"clear\"/>Cleared."),
    ]);
    assert_eq!(reply(&engine, "add buy milk"), "Added.");
    assert_eq!(reply(&engine, "add call mom"), "Added.");
    assert_eq!(reply(&engine, "count tasks"), "2");
    assert_eq!(reply(&engine, "first task"), "BUY MILK");
    assert_eq!(reply(&engine, "clear tasks"), "Cleared.");
    assert_eq!(reply(&engine, "count tasks"), "0");
}

// ---- Transforms ----

#[test]
fn transforms_nest_inside_out() {
    let engine = engine_with(&[(
        "SHOUT *",
        "<uppercase><person><star/></person></uppercase>",
    )]);
    // person runs first on the captured text, then uppercase.
    assert_eq!(reply(&engine, "shout my idea"), "YOUR IDEA");
}

#[test]
fn common_transforms() {
    let engine = engine_with(&[
        ("T1 *", "<formal><star/></formal>"),
        ("T2 *", "<explode><star/></explode>"),
        ("T3 *", "<acronym><star/></acronym>"),
        ("T4 *", "<repeat times=\"3\"><star/></repeat>"),
        ("T5 *", "<first><star/></first>/<rest><star/></rest>"),
        ("T6 *", "<length><star/></length>"),
    ]);
    assert_eq!(reply(&engine, "t1 good old days"), "Good Old Days");
    assert_eq!(reply(&engine, "t2 abc"), "A B C");
    assert_eq!(reply(&engine, "t3 as soon as possible"), "ASAP");
    assert_eq!(reply(&engine, "t4 ha"), "HAHAHA");
    assert_eq!(reply(&engine, "t5 one two three"), "ONE/TWO THREE");
    assert_eq!(reply(&engine, "t6 hello"), "5");
}

// ---- Date/time ----

#[test]
fn date_and_time_use_injected_clock() {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 2, 14, 15, 4, 5).unwrap());
    let engine = Engine::new(EngineConfig::default()).with_clock(Box::new(clock));
    engine.load_categories(vec![
        record("WHAT DAY IS IT", "<date format=\"weekday\"/>"),
        record("WHAT TIME IS IT", "<time format=\"24\"/>"),
        record("STAMP", "<date format=\"yyyy-MM-dd\"/>"),
    ]);
    assert_eq!(reply(&engine, "what day is it"), "Wednesday");
    assert_eq!(reply(&engine, "what time is it"), "15:04");
    assert_eq!(reply(&engine, "stamp"), "2024-02-14");
}

#[test]
fn interval_between_fixed_dates() {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 2, 14, 0, 0, 0).unwrap());
    let engine = Engine::new(EngineConfig::default()).with_clock(Box::new(clock));
    engine.load_categories(vec![
        record("HOW LONG", "<interval from=\"2024-01-01\"/>"),
        record(
            "HOW LONG EXACTLY",
            "<interval from=\"2024-01-01\" to=\"2024-01-31\" style=\"hours\"/>",
        ),
    ]);
    // Jan 1 to Feb 14 of a leap year.
    assert_eq!(reply(&engine, "how long"), "44");
    assert_eq!(reply(&engine, "how long exactly"), "720");
}

// ---- Context captures ----

#[test]
fn thatstar_binds_previous_reply_wildcards() {
    let engine = Engine::new(EngineConfig::default());
    let report = engine.load_categories(vec![
        record("ASK ME", "DO YOU LIKE GREEN TEA"),
        CategoryRecord {
            pattern: "YES".into(),
            that: "DO YOU LIKE *".into(),
            topic: String::new(),
            template: "So you like <thatstar/>.".into(),
        },
    ]);
    assert!(report.rejected.is_empty());

    engine.process_turn(Some("s1"), "ask me");
    assert_eq!(reply(&engine, "yes"), "So you like GREEN TEA.");
}

#[test]
fn topicstar_binds_topic_wildcards() {
    let engine = Engine::new(EngineConfig::default());
    let report = engine.load_categories(vec![
        record("SWITCH *", "<think><set name=\"topic\"><star/></set></think>Okay."),
        CategoryRecord {
            pattern: "WHERE ARE WE".into(),
            that: String::new(),
            topic: "TOPIC *".into(),
            template: "Deep in <topicstar/>.".into(),
        },
    ]);
    assert!(report.rejected.is_empty());

    engine.process_turn(Some("s1"), "switch topic rust");
    assert_eq!(reply(&engine, "where are we"), "Deep in RUST.");
}

// ---- System ----

#[test]
fn size_version_id_and_vocabulary() {
    let engine = engine_with(&[
        ("HOW BIG", "<size/>"),
        ("WHICH VERSION", "<version/>"),
        ("WHO AM I TALKING TO", "<id/>"),
        ("VOCAB", "<vocabulary/>"),
    ]);
    engine.set_property("version", "0.1.0");
    engine.set_property("id", "golem-1");
    assert_eq!(reply(&engine, "how big"), "4");
    assert_eq!(reply(&engine, "which version"), "0.1.0");
    assert_eq!(reply(&engine, "who am i talking to"), "golem-1");
    // HOW BIG WHICH VERSION WHO AM I TALKING TO VOCAB → ten distinct words.
    assert_eq!(reply(&engine, "vocab"), "10");
}

#[test]
fn rdf_helpers_space_concatenate() {
    let engine = engine_with(&[(
        "TRIPLE",
        "<uniq><subj> Socrates </subj><pred>is</pred><obj> mortal</obj></uniq>",
    )]);
    assert_eq!(reply(&engine, "triple"), "Socrates is mortal");
}

// ---- Error paths ----

#[test]
fn unknown_tag_echoes_itself_with_evaluated_content() {
    let engine = engine_with(&[("ODD", "<sparkle level=\"9\"><star/>x</sparkle>")]);
    let out = reply(&engine, "odd");
    assert_eq!(out, "<sparkle level=\"9\">x</sparkle>");
}

#[test]
fn malformed_template_degrades_to_text() {
    let engine = engine_with(&[("BROKEN", "before <uppercase>never closed")]);
    let out = reply(&engine, "broken");
    assert_eq!(out, "before <uppercase>never closed");
}

#[test]
fn missing_required_attribute_yields_empty() {
    let engine = engine_with(&[("EMPTYSET", "[<set>ignored</set><get/>]")]);
    // A set without a name writes nothing and emits nothing; a get without
    // a name reads nothing.
    assert_eq!(reply(&engine, "emptyset"), "[]");
}
