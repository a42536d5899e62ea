//! Text transform tags. Each operates on its fully evaluated body; nested
//! transforms therefore compose inside-out.

use crate::ast::Element;
use crate::normalize::normalize_input;

use super::EvalContext;

/// Upper bound for `repeat times=`; template-driven output must stay sane.
const REPEAT_LIMIT: usize = 100;

pub fn transform(el: &Element, body: String, ctx: &mut EvalContext) -> String {
    match el.name.as_str() {
        "uppercase" => body.to_uppercase(),
        "lowercase" => body.to_lowercase(),
        "formal" => formal(&body),
        "capitalize" => capitalize(&body),
        "sentence" => sentence(&body),
        "explode" => explode(&body),
        "reverse" => body.chars().rev().collect(),
        "acronym" => acronym(&body),
        "trim" => body.trim().to_string(),
        "substring" => substring(el, &body),
        "replace" => replace(el, &body),
        "pluralize" => pluralize(body.trim()),
        "shuffle" => shuffle(&body, ctx),
        "length" => body.chars().count().to_string(),
        "count" => body.split_whitespace().count().to_string(),
        "split" => split(el, &body),
        "join" => join(el, &body),
        "unique" => unique(&body),
        "indent" => indent(el, &body),
        "dedent" => dedent(&body),
        "repeat" => repeat(el, &body),
        "first" => body.split_whitespace().next().unwrap_or("").to_string(),
        "rest" => rest(&body),
        "normalize" => normalize_input(&body),
        "denormalize" => denormalize(&body),
        _ => body,
    }
}

/// Title case: every word capitalized.
fn formal(s: &str) -> String {
    s.split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First letter only.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Capitalize the first letter of each sentence, leaving the rest alone.
fn sentence(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_start = true;
    for c in s.chars() {
        if at_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            at_start = false;
        } else {
            if matches!(c, '.' | '!' | '?') {
                at_start = true;
            }
            out.push(c);
        }
    }
    out
}

/// Space out every character: `ABC` becomes `A B C`.
fn explode(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

fn acronym(s: &str) -> String {
    s.split_whitespace()
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Char-based `[start, end)` slice, clamped; `end` defaults to the end.
fn substring(el: &Element, s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let start = el
        .attr("start")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0)
        .min(chars.len());
    let end = el
        .attr("end")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(chars.len())
        .min(chars.len());
    if start >= end {
        return String::new();
    }
    chars[start..end].iter().collect()
}

fn replace(el: &Element, s: &str) -> String {
    let Some(search) = el.attr("search").filter(|v| !v.is_empty()) else {
        return String::new();
    };
    let replacement = el.attr("replace").unwrap_or("");
    s.replace(search, replacement)
}

/// Naive English pluralization; good enough for reply text.
fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before_y = stem.chars().last();
        if before_y.is_some_and(|c| !"aeiouAEIOU".contains(c)) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

fn shuffle(s: &str, ctx: &EvalContext) -> String {
    let mut words: Vec<String> = s.split_whitespace().map(str::to_string).collect();
    ctx.chooser.shuffle(&mut words);
    words.join(" ")
}

/// Split on the `separator` attribute (default whitespace), re-joined with
/// a comma-space list separator.
fn split(el: &Element, s: &str) -> String {
    let parts: Vec<&str> = match el.attr("separator").filter(|sep| !sep.is_empty()) {
        Some(sep) => s.split(sep).collect(),
        None => s.split_whitespace().collect(),
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Join whitespace-separated words with the `separator` attribute.
fn join(el: &Element, s: &str) -> String {
    let separator = el.attr("separator").unwrap_or("");
    s.split_whitespace().collect::<Vec<_>>().join(separator)
}

/// Drop repeated words, keeping first occurrences in order.
fn unique(s: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    s.split_whitespace()
        .filter(|w| seen.insert(w.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn indent(el: &Element, s: &str) -> String {
    let count = el
        .attr("count")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(2);
    let pad = " ".repeat(count);
    s.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn dedent(s: &str) -> String {
    let margin = s
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    s.lines()
        .map(|l| {
            if l.len() >= margin && l.is_char_boundary(margin) {
                &l[margin..]
            } else {
                l.trim_start()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn repeat(el: &Element, s: &str) -> String {
    let Some(times) = el.attr("times").and_then(|v| v.trim().parse::<usize>().ok()) else {
        return String::new();
    };
    s.repeat(times.min(REPEAT_LIMIT))
}

fn rest(s: &str) -> String {
    let mut words = s.split_whitespace();
    words.next();
    words.collect::<Vec<_>>().join(" ")
}

/// Minimal inverse of input normalization: lowercase plus spoken-form
/// substitutions folded back into symbols.
fn denormalize(s: &str) -> String {
    let mut out = format!(" {} ", s.to_lowercase());
    for (spoken, symbol) in [(" dot ", "."), (" at ", "@"), (" dash ", "-"), (" slash ", "/")] {
        while let Some(pos) = out.find(spoken) {
            out.replace_range(pos..pos + spoken.len(), symbol);
        }
    }
    out.trim().to_string()
}
