//! # Pattern Model
//! Tokenized patterns, the wildcard classes, and specificity scoring.
//!
//! A pattern is an ordered token sequence over a normalized string. Wildcard
//! classes, from strongest to weakest claim on an input: `$WORD` (exact
//! literal with a priority boost), `#` (zero or more), set references,
//! `_` (one or more), `^` (zero or more), `*` (one or more). Literals and
//! bot-property references sit above all of them.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::normalize::normalize_pattern;

/// One parsed category record, as handed over by the external loader, the
/// HTTP surface, or the learning tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub pattern: String,
    #[serde(default)]
    pub that: String,
    #[serde(default)]
    pub topic: String,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    /// Plain uppercased word.
    Literal(String),
    /// `$WORD`: matches exactly like a literal, outranks one.
    Exact(String),
    /// `<bot>NAME</bot>`: matches the current value of a bot property.
    BotRef(String),
    /// `<set>NAME</set>`: one token that is a member of the named set.
    SetRef(String),
    /// `#`: zero or more tokens.
    Sharp,
    /// `_`: one or more tokens.
    Underscore,
    /// `^`: zero or more tokens.
    Caret,
    /// `*`: one or more tokens.
    Star,
}

impl PatternToken {
    /// True for tokens that bind a `star` capture.
    pub fn captures(&self) -> bool {
        matches!(
            self,
            PatternToken::SetRef(_)
                | PatternToken::Sharp
                | PatternToken::Underscore
                | PatternToken::Caret
                | PatternToken::Star
        )
    }

    /// True for the four plain wildcard classes (set references excluded).
    pub fn is_wildcard(&self) -> bool {
        matches!(
            self,
            PatternToken::Sharp | PatternToken::Underscore | PatternToken::Caret | PatternToken::Star
        )
    }

    /// Tie-break weight of the class; lower binds tighter.
    fn class_penalty(&self) -> i64 {
        match self {
            PatternToken::Sharp => 1,
            PatternToken::SetRef(_) => 2,
            PatternToken::Underscore => 3,
            PatternToken::Caret => 4,
            PatternToken::Star => 5,
            _ => 0,
        }
    }
}

/// Parse an already-normalized pattern string into tokens.
///
/// Rejects empty patterns and malformed wildcard tokens (a wildcard glyph
/// glued to other characters, e.g. `*FOO`).
pub fn parse_tokens(normalized: &str) -> Result<Vec<PatternToken>, EngineError> {
    if normalized.is_empty() {
        return Err(EngineError::MalformedPattern("empty pattern".into()));
    }
    let mut tokens = Vec::new();
    for word in normalized.split(' ') {
        tokens.push(parse_word(word)?);
    }
    Ok(tokens)
}

fn parse_word(word: &str) -> Result<PatternToken, EngineError> {
    match word {
        "#" => return Ok(PatternToken::Sharp),
        "_" => return Ok(PatternToken::Underscore),
        "^" => return Ok(PatternToken::Caret),
        "*" => return Ok(PatternToken::Star),
        _ => {}
    }
    if let Some(name) = marker_name(word, "<set>", "</set>") {
        return Ok(PatternToken::SetRef(name));
    }
    if let Some(name) = marker_name(word, "<bot>", "</bot>") {
        return Ok(PatternToken::BotRef(name));
    }
    if let Some(rest) = word.strip_prefix('$') {
        if rest.is_empty() || rest.contains(['*', '_', '^', '#']) {
            return Err(EngineError::MalformedPattern(format!("bad priority token '{word}'")));
        }
        return Ok(PatternToken::Exact(rest.to_string()));
    }
    if word.contains(['*', '_', '^', '#']) {
        return Err(EngineError::MalformedPattern(format!(
            "wildcard glyph inside literal '{word}'"
        )));
    }
    Ok(PatternToken::Literal(word.to_string()))
}

fn marker_name(word: &str, open: &str, close: &str) -> Option<String> {
    word.strip_prefix(open)?.strip_suffix(close).map(str::to_string)
}

/// Maximum capturing tokens across the pattern/that/topic triple.
pub const MAX_CAPTURES: usize = 9;

/// Compiled form of one context axis (pattern, that, or topic).
#[derive(Debug, Clone, Default)]
pub struct CompiledPattern {
    pub source: String,
    pub tokens: Vec<PatternToken>,
}

impl CompiledPattern {
    /// Normalize and tokenize. An empty source compiles to the empty (always
    /// passing) context.
    pub fn compile(source: &str) -> Result<Self, EngineError> {
        let normalized = normalize_pattern(source);
        if normalized.is_empty() {
            return Ok(Self::default());
        }
        let tokens = parse_tokens(&normalized)?;
        Ok(Self {
            source: normalized,
            tokens,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn capture_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.captures()).count()
    }
}

/// Specificity of a category over its full triple; lower is more specific.
///
/// `wildcard_count * 1000 + class_penalty * 100 + first_wildcard_position`,
/// minus one per `$` boost token. Set references count as wildcards here
/// (they bind a capture), with a class penalty placing them below `#` and
/// above `_`. Exact-literal triples score 0.
pub fn specificity(axes: [&CompiledPattern; 3]) -> i64 {
    let mut wildcards = 0i64;
    let mut penalty = 0i64;
    let mut first_pos: Option<i64> = None;
    let mut boost = 0i64;
    let mut pos = 0i64;
    for axis in axes {
        for token in &axis.tokens {
            if token.captures() {
                wildcards += 1;
                penalty += token.class_penalty();
                first_pos.get_or_insert(pos);
            }
            if matches!(token, PatternToken::Exact(_)) {
                boost += 1;
            }
            pos += 1;
        }
    }
    wildcards * 1000 + penalty * 100 + first_pos.unwrap_or(0) - boost
}
