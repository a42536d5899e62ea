//! Pronoun transforms: `person` (1st↔2nd), `person2` (1st→3rd), and
//! `gender` (masculine↔feminine).
//!
//! Substitution is word-level over alphanumeric-plus-apostrophe tokens, so
//! apostrophes inside ordinary words (`don't`) are left alone. Casing of
//! the original word carries over: `HIS` becomes `HER`, `His` becomes
//! `Her`. The pronoun `I` and its contractions keep the replacement's own
//! casing, which is how `I think` turns into `you think` rather than
//! `You think`.
//!
//! The second-person possessive `your` is deliberately not swapped back:
//! in running text its antecedent is usually not the speaker, and mapping
//! it to `my` inverts meaning more often than it fixes it.

use once_cell::sync::Lazy;

// Ordered first-match-wins pairs; keys lowercase, values carry their
// intrinsic casing.
static PERSON: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("i'm", "you're"),
        ("you're", "I'm"),
        ("i've", "you've"),
        ("you've", "I've"),
        ("i'll", "you'll"),
        ("you'll", "I'll"),
        ("i'd", "you'd"),
        ("you'd", "I'd"),
        ("i", "you"),
        ("you", "I"),
        ("me", "you"),
        ("my", "your"),
        ("mine", "yours"),
        ("yours", "mine"),
        ("myself", "yourself"),
        ("yourself", "myself"),
        ("am", "are"),
    ]
});

static PERSON2: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("i'm", "they're"),
        ("i've", "they've"),
        ("i'll", "they'll"),
        ("i'd", "they'd"),
        ("i", "they"),
        ("me", "them"),
        ("my", "their"),
        ("mine", "theirs"),
        ("myself", "themselves"),
        ("am", "are"),
    ]
});

static GENDER: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("he's", "she's"),
        ("she's", "he's"),
        ("he", "she"),
        ("she", "he"),
        ("his", "her"),
        ("him", "her"),
        ("her", "his"),
        ("hers", "his"),
        ("himself", "herself"),
        ("herself", "himself"),
    ]
});

pub fn person(text: &str) -> String {
    swap_words(text, &PERSON)
}

pub fn person2(text: &str) -> String {
    swap_words(text, &PERSON2)
}

pub fn gender(text: &str) -> String {
    swap_words(text, &GENDER)
}

fn swap_words(text: &str, table: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() || c == '\'' {
            word.push(c);
        } else {
            flush_word(&mut out, &mut word, table);
            out.push(c);
        }
    }
    flush_word(&mut out, &mut word, table);
    out
}

fn flush_word(out: &mut String, word: &mut String, table: &[(&str, &str)]) {
    if word.is_empty() {
        return;
    }
    let lower = word.to_lowercase();
    match table.iter().find(|(from, _)| *from == lower) {
        Some((_, to)) => out.push_str(&recase(word, to)),
        None => out.push_str(word),
    }
    word.clear();
}

/// Carry the original word's casing onto the replacement. First-person
/// forms (`I`, `I'm`, ...) are excluded from the capitalized rule; their
/// uppercase `I` says nothing about emphasis.
fn recase(original: &str, replacement: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    let all_upper = letters.len() > 1 && letters.iter().all(|c| c.is_uppercase());
    if all_upper {
        return replacement.to_uppercase();
    }

    let first_person = matches!(
        original.to_lowercase().as_str(),
        "i" | "i'm" | "i've" | "i'll" | "i'd"
    );
    let capitalized = !first_person
        && letters.first().is_some_and(|c| c.is_uppercase())
        && letters.iter().skip(1).all(|c| c.is_lowercase());
    if capitalized {
        let mut chars = replacement.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
    }
    replacement.to_string()
}
