//! # Match Engine
//! Priority-ordered resolution of an input against the category index.
//!
//! Resolution runs in stages: enumerate pattern matches, filter by the
//! that-context (the bot's previous reply), filter by topic, then order by
//! specificity with context-presence and insertion-order tie-breaks. A
//! failed that-filter can optionally fall back to fuzzy re-admission for
//! wildcard-free contexts, so near-verbatim prior replies still bind.
//!
//! No match is a normal outcome, not an error; the caller substitutes the
//! configured default response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::index::Category;
use crate::kb::KnowledgeBase;
use crate::normalize::normalize_input;
use crate::pattern::PatternToken;

/// Fuzzy that-context re-admission. Off by default; thresholds are
/// empirical and tunable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyContextConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_fuzzy_threshold")]
    pub threshold: f64,
}

fn default_fuzzy_threshold() -> f64 {
    0.85
}

impl Default for FuzzyContextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_fuzzy_threshold(),
        }
    }
}

/// One match query. All strings are already in normalized input form.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery<'a> {
    pub input: &'a str,
    pub that: &'a str,
    pub topic: &'a str,
    pub session: Option<&'a str>,
}

/// The winning category plus its captured spans, in pattern order, then
/// that order, then topic order.
#[derive(Debug)]
pub struct MatchResult {
    pub category: Arc<Category>,
    pub stars: Vec<String>,
    pub that_stars: Vec<String>,
    pub topic_stars: Vec<String>,
}

impl MatchResult {
    /// All captures flattened left-to-right across the three axes.
    pub fn all_stars(&self) -> Vec<String> {
        let mut all = self.stars.clone();
        all.extend(self.that_stars.iter().cloned());
        all.extend(self.topic_stars.iter().cloned());
        all
    }
}

/// Resolve a query against every category visible to the session.
pub fn resolve(kb: &KnowledgeBase, query: &MatchQuery, fuzzy: &FuzzyContextConfig) -> Option<MatchResult> {
    let input_tokens = tokens_of(query.input);
    if input_tokens.is_empty() {
        return None;
    }
    let that_tokens = tokens_of(query.that);
    let topic_tokens = tokens_of(query.topic);

    // Stage 1: pattern matches with captures. Literal-first patterns are
    // pre-filtered on the opening token, which skips the token walk for
    // most of the corpus without changing the result set.
    let first = input_tokens[0];
    let mut pattern_hits: Vec<(Arc<Category>, Vec<String>)> = Vec::new();
    for category in kb.index.visible(query.session) {
        if !category.admits_first_token(first) {
            continue;
        }
        if let Some(stars) = match_tokens(&category.pattern.tokens, &input_tokens, kb) {
            pattern_hits.push((category, stars));
        }
    }

    // Stage 2: that-context filter.
    let mut survivors: Vec<MatchResult> = Vec::new();
    for (category, stars) in &pattern_hits {
        if category.that.is_empty() {
            survivors.push(MatchResult {
                category: category.clone(),
                stars: stars.clone(),
                that_stars: Vec::new(),
                topic_stars: Vec::new(),
            });
        } else if let Some(that_stars) = match_tokens(&category.that.tokens, &that_tokens, kb) {
            survivors.push(MatchResult {
                category: category.clone(),
                stars: stars.clone(),
                that_stars,
                topic_stars: Vec::new(),
            });
        }
    }

    if survivors.is_empty() && fuzzy.enabled && !query.that.is_empty() {
        survivors = fuzzy_readmit(&pattern_hits, query.that, fuzzy.threshold);
    }

    // Stage 3: topic filter.
    let mut finalists: Vec<MatchResult> = Vec::new();
    for mut candidate in survivors {
        if candidate.category.topic.is_empty() {
            finalists.push(candidate);
        } else if let Some(topic_stars) = match_tokens(&candidate.category.topic.tokens, &topic_tokens, kb) {
            candidate.topic_stars = topic_stars;
            finalists.push(candidate);
        }
    }

    // Stage 4: specificity, then context presence, then insertion order.
    finalists.sort_by_key(|c| {
        (
            c.category.specificity,
            c.category.that.is_empty(),
            c.category.topic.is_empty(),
            c.category.seq,
        )
    });
    finalists.into_iter().next()
}

/// Re-admit candidates whose wildcard-free that-context is close enough to
/// the actual previous reply.
fn fuzzy_readmit(
    pattern_hits: &[(Arc<Category>, Vec<String>)],
    that: &str,
    threshold: f64,
) -> Vec<MatchResult> {
    let mut out = Vec::new();
    for (category, stars) in pattern_hits {
        let axis = &category.that;
        if axis.is_empty() || !axis.tokens.iter().all(is_plain_word) {
            continue;
        }
        if strsim::jaro_winkler(&axis.source, that) >= threshold {
            out.push(MatchResult {
                category: category.clone(),
                stars: stars.clone(),
                that_stars: Vec::new(),
                topic_stars: Vec::new(),
            });
        }
    }
    out
}

fn is_plain_word(token: &PatternToken) -> bool {
    matches!(token, PatternToken::Literal(_) | PatternToken::Exact(_))
}

fn tokens_of(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(' ').collect()
    }
}

/// Match a token sequence against input tokens, returning the captured
/// spans (one per capturing token) on success.
///
/// Capture is greedy for `*`/`_` and lazy for `#`/`^`; where several splits
/// succeed, the first in that order wins.
pub fn match_tokens(pattern: &[PatternToken], input: &[&str], kb: &KnowledgeBase) -> Option<Vec<String>> {
    let mut captures = Vec::new();
    if match_from(pattern, input, kb, &mut captures) {
        Some(captures)
    } else {
        None
    }
}

fn match_from(pattern: &[PatternToken], input: &[&str], kb: &KnowledgeBase, caps: &mut Vec<String>) -> bool {
    let Some((token, rest)) = pattern.split_first() else {
        return input.is_empty();
    };

    match token {
        PatternToken::Literal(word) | PatternToken::Exact(word) => input
            .split_first()
            .is_some_and(|(first, tail)| *first == word && match_from(rest, tail, kb, caps)),

        PatternToken::BotRef(name) => {
            let Some(value) = kb.property(name) else {
                return false;
            };
            let normalized = normalize_input(value);
            if normalized.is_empty() {
                return false;
            }
            let expected: Vec<&str> = normalized.split(' ').collect();
            input.len() >= expected.len()
                && input[..expected.len()] == expected[..]
                && match_from(rest, &input[expected.len()..], kb, caps)
        }

        PatternToken::SetRef(name) => input.split_first().is_some_and(|(first, tail)| {
            if !kb.set_contains(name, first) {
                return false;
            }
            caps.push((*first).to_string());
            if match_from(rest, tail, kb, caps) {
                true
            } else {
                caps.pop();
                false
            }
        }),

        // Zero-or-more classes bind lazily: shortest span first.
        PatternToken::Sharp | PatternToken::Caret => {
            for split in 0..=input.len() {
                caps.push(input[..split].join(" "));
                if match_from(rest, &input[split..], kb, caps) {
                    return true;
                }
                caps.pop();
            }
            false
        }

        // One-or-more classes bind greedily: longest span first.
        PatternToken::Underscore | PatternToken::Star => {
            for split in (1..=input.len()).rev() {
                caps.push(input[..split].join(" "));
                if match_from(rest, &input[split..], kb, caps) {
                    return true;
                }
                caps.pop();
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::CategoryRecord;

    fn kb_with(categories: &[(&str, &str, &str, &str)]) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        let records: Vec<CategoryRecord> = categories
            .iter()
            .map(|(p, that, topic, t)| CategoryRecord {
                pattern: (*p).into(),
                that: (*that).into(),
                topic: (*topic).into(),
                template: (*t).into(),
            })
            .collect();
        let report = kb.load_categories(records, None);
        assert!(report.rejected.is_empty(), "fixture categories must load");
        kb
    }

    fn resolve_input<'a>(kb: &KnowledgeBase, input: &'a str) -> Option<MatchResult> {
        resolve(
            kb,
            &MatchQuery {
                input,
                ..MatchQuery::default()
            },
            &FuzzyContextConfig::default(),
        )
    }

    #[test]
    fn exact_pattern_matches_itself() {
        let kb = kb_with(&[("HELLO", "", "", "hi")]);
        let result = resolve_input(&kb, "HELLO").expect("match");
        assert_eq!(result.category.template, "hi");
        assert!(result.stars.is_empty());
    }

    #[test]
    fn no_match_on_empty_input() {
        let kb = kb_with(&[("HELLO", "", "", "hi")]);
        assert!(resolve_input(&kb, "").is_none());
    }

    #[test]
    fn star_captures_tail() {
        let kb = kb_with(&[("MY NAME IS *", "", "", "t")]);
        let result = resolve_input(&kb, "MY NAME IS JOHN SMITH").expect("match");
        assert_eq!(result.stars, vec!["JOHN SMITH".to_string()]);
    }

    #[test]
    fn star_needs_at_least_one_token() {
        let kb = kb_with(&[("MY NAME IS *", "", "", "t")]);
        assert!(resolve_input(&kb, "MY NAME IS").is_none());
    }

    #[test]
    fn sharp_matches_zero_tokens() {
        let kb = kb_with(&[("# HELLO", "", "", "t")]);
        let result = resolve_input(&kb, "HELLO").expect("match");
        assert_eq!(result.stars, vec![String::new()]);
        let result = resolve_input(&kb, "WELL HELLO").expect("match");
        assert_eq!(result.stars, vec!["WELL".to_string()]);
    }

    #[test]
    fn greedy_star_lazy_sharp() {
        let kb = kb_with(&[("* A #", "", "", "t")]);
        let result = resolve_input(&kb, "X A Y A Z").expect("match");
        // '*' grabs the longest span that still lets the rest match.
        assert_eq!(result.stars, vec!["X A Y".to_string(), "Z".to_string()]);
    }

    #[test]
    fn fewer_wildcards_win() {
        let kb = kb_with(&[("HELLO * *", "", "", "loose"), ("HELLO * WORLD", "", "", "tight")]);
        let result = resolve_input(&kb, "HELLO BIG WORLD").expect("match");
        assert_eq!(result.category.template, "tight");
    }

    #[test]
    fn underscore_beats_star_on_tie() {
        let kb = kb_with(&[("* RULES", "", "", "star"), ("_ RULES", "", "", "under")]);
        let result = resolve_input(&kb, "RUST RULES").expect("match");
        assert_eq!(result.category.template, "under");
    }

    #[test]
    fn priority_token_beats_plain_literal() {
        let kb = kb_with(&[("HELLO *", "", "", "plain"), ("$HELLO *", "", "", "boosted")]);
        let result = resolve_input(&kb, "HELLO THERE").expect("match");
        assert_eq!(result.category.template, "boosted");
    }

    #[test]
    fn set_token_matches_members_only() {
        let mut kb = kb_with(&[("I LIKE <set>COLOR</set>", "", "", "t")]);
        kb.load_set("color", ["red".into(), "blue".into()]);
        let result = resolve_input(&kb, "I LIKE RED").expect("match");
        assert_eq!(result.stars, vec!["RED".to_string()]);
        assert!(resolve_input(&kb, "I LIKE TRAINS").is_none());
    }

    #[test]
    fn bot_ref_matches_property_value() {
        let mut kb = kb_with(&[("ARE YOU <bot>NAME</bot>", "", "", "t")]);
        kb.set_property("name", "Golem");
        assert!(resolve_input(&kb, "ARE YOU GOLEM").is_some());
        assert!(resolve_input(&kb, "ARE YOU HAL").is_none());
    }

    #[test]
    fn that_context_filters_and_is_preferred() {
        let kb = kb_with(&[
            ("YES", "", "", "bare"),
            ("YES", "DO YOU LIKE TEA", "", "tea"),
        ]);
        let query = MatchQuery {
            input: "YES",
            that: "DO YOU LIKE TEA",
            ..MatchQuery::default()
        };
        let result = resolve(&kb, &query, &FuzzyContextConfig::default()).expect("match");
        assert_eq!(result.category.template, "tea");

        let query = MatchQuery {
            input: "YES",
            that: "SOMETHING ELSE",
            ..MatchQuery::default()
        };
        let result = resolve(&kb, &query, &FuzzyContextConfig::default()).expect("match");
        assert_eq!(result.category.template, "bare");
    }

    #[test]
    fn that_wildcards_capture() {
        let kb = kb_with(&[("YES", "DO YOU LIKE *", "", "t")]);
        let query = MatchQuery {
            input: "YES",
            that: "DO YOU LIKE GREEN TEA",
            ..MatchQuery::default()
        };
        let result = resolve(&kb, &query, &FuzzyContextConfig::default()).expect("match");
        assert_eq!(result.that_stars, vec!["GREEN TEA".to_string()]);
        assert_eq!(result.all_stars(), vec!["GREEN TEA".to_string()]);
    }

    #[test]
    fn topic_context_filters_and_is_preferred() {
        let kb = kb_with(&[("GO ON", "", "", "bare"), ("GO ON", "", "BEER", "beer")]);
        let query = MatchQuery {
            input: "GO ON",
            topic: "BEER",
            ..MatchQuery::default()
        };
        let result = resolve(&kb, &query, &FuzzyContextConfig::default()).expect("match");
        assert_eq!(result.category.template, "beer");

        let query = MatchQuery {
            input: "GO ON",
            topic: "WINE",
            ..MatchQuery::default()
        };
        let result = resolve(&kb, &query, &FuzzyContextConfig::default()).expect("match");
        assert_eq!(result.category.template, "bare");
    }

    #[test]
    fn tighter_pattern_wins_on_shared_prefix() {
        let kb = kb_with(&[("TIE ^ *", "", "", "loose"), ("TIE *", "", "", "tight")]);
        let result = resolve_input(&kb, "TIE BREAK").expect("match");
        assert_eq!(result.category.template, "tight");
    }

    #[test]
    fn insertion_order_breaks_exact_ties() {
        let mut kb = kb_with(&[
            ("HI <set>A</set>", "", "", "first"),
            ("HI <set>B</set>", "", "", "second"),
        ]);
        kb.load_set("A", ["x".into()]);
        kb.load_set("B", ["x".into()]);
        // Identical specificity; the earlier insertion wins.
        let result = resolve_input(&kb, "HI X").expect("match");
        assert_eq!(result.category.template, "first");
    }

    #[test]
    fn fuzzy_readmits_close_that_context() {
        let kb = kb_with(&[("YES", "DO YOU LIKE GREEN TEA", "", "t")]);
        let fuzzy = FuzzyContextConfig {
            enabled: true,
            threshold: 0.85,
        };
        let query = MatchQuery {
            input: "YES",
            that: "DO YOU LIKE GREEN TEAS",
            ..MatchQuery::default()
        };
        assert!(resolve(&kb, &query, &FuzzyContextConfig::default()).is_none());
        assert!(resolve(&kb, &query, &fuzzy).is_some());
    }
}
