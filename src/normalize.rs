//! # Normalizer
//! Canonical forms for patterns and user inputs.
//!
//! - Uppercases, collapses whitespace runs, trims.
//! - Inputs additionally lose user punctuation (`.,!?;:` and brackets);
//!   apostrophes inside words survive so contractions keep matching.
//! - Structural tokens (`<set>NAME</set>`, `<topic>NAME</topic>`,
//!   `<bot>NAME</bot>`) round-trip verbatim: lowercase markers, uppercased
//!   inner name.
//!
//! Pure functions, no I/O; both operations are idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

/// Structural markers that must survive normalization untouched.
static PROTECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(set|topic|bot)>\s*([^<>]*?)\s*</(set|topic|bot)>").expect("protected-token regex")
});

/// Characters stripped from inputs but kept in patterns.
static INPUT_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[.,!?;:"()\[\]{}]+"#).expect("punctuation regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Canonical pattern form: uppercase, single spaces, structural tokens kept.
pub fn normalize_pattern(s: &str) -> String {
    normalize(s, false)
}

/// Canonical input form: like [`normalize_pattern`] but punctuation-stripped.
///
/// Returns an empty string when nothing alphanumeric remains; the match
/// engine treats that as "no match".
pub fn normalize_input(s: &str) -> String {
    let out = normalize(s, true);
    if out.chars().any(|c| c.is_alphanumeric()) {
        out
    } else {
        String::new()
    }
}

fn normalize(s: &str, strip_punct: bool) -> String {
    // Walk protected markers and normalize the plain segments between them.
    let mut out = String::with_capacity(s.len());
    let mut last = 0usize;
    for caps in PROTECTED.captures_iter(s) {
        let whole = caps.get(0).expect("full match");
        push_plain(&mut out, &s[last..whole.start()], strip_punct);
        let marker = caps.get(1).expect("marker").as_str().to_ascii_lowercase();
        let name = caps.get(2).expect("name").as_str().trim().to_uppercase();
        if !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
        out.push('<');
        out.push_str(&marker);
        out.push('>');
        out.push_str(&name);
        out.push_str("</");
        out.push_str(&marker);
        out.push('>');
        out.push(' ');
        last = whole.end();
    }
    push_plain(&mut out, &s[last..], strip_punct);

    WHITESPACE.replace_all(out.trim(), " ").into_owned()
}

fn push_plain(out: &mut String, segment: &str, strip_punct: bool) {
    if segment.is_empty() {
        return;
    }
    let upper = segment.to_uppercase();
    if strip_punct {
        out.push_str(&INPUT_PUNCT.replace_all(&upper, " "));
    } else {
        out.push_str(&upper);
    }
}
