//! Learning tags: install categories at runtime (`learn`, `learnf`) and
//! retire them (`unlearn`, `unlearnf`).
//!
//! Both learning tags receive their children unevaluated. Inside a learned
//! template, reference tags are re-serialized verbatim so they bind when
//! the new category fires later; `<eval>` bodies and all other tags
//! evaluate immediately. Pattern, that, and topic sections are literal
//! except for `<eval>`.
//!
//! `learn` scopes the category to the current session; `learnf` installs it
//! globally and queues a durable write, which the engine commits only after
//! the whole turn's evaluation has returned.

use metrics::counter;

use crate::ast::{node_to_source, Element, Node};
use crate::error::EngineError;
use crate::learning::{self, PersistEffect};
use crate::normalize::normalize_pattern;
use crate::pattern::CategoryRecord;

use super::{eval_node, eval_nodes, EvalContext};

/// Tags kept verbatim inside learned templates.
const PRESERVED: &[&str] = &[
    "star", "that", "thatstar", "topicstar", "input", "request", "response", "sr", "srai",
    "sraix", "get", "set", "bot", "name", "id", "size", "version", "date", "vocabulary",
    "uppercase", "lowercase", "formal", "sentence", "explode", "normalize", "condition", "li",
    "random",
];

pub fn learn(el: &Element, ctx: &mut EvalContext, persist: bool) -> String {
    for category_el in child_elements(el, "category") {
        let Some(pattern_el) = child_element(category_el, "pattern") else {
            ctx.diagnostics.push("learned category without a pattern".into());
            continue;
        };
        let Some(template_el) = child_element(category_el, "template") else {
            ctx.diagnostics.push("learned category without a template".into());
            continue;
        };

        let record = CategoryRecord {
            pattern: literal_source(&pattern_el.children, ctx),
            that: child_element(category_el, "that")
                .map(|e| literal_source(&e.children, ctx))
                .unwrap_or_default(),
            topic: child_element(category_el, "topic")
                .map(|e| literal_source(&e.children, ctx))
                .unwrap_or_default(),
            template: preserved_source(&template_el.children, ctx),
        };

        let owner = if persist { None } else { Some(ctx.session.id.clone()) };
        let installed = {
            let mut kb = ctx.kb.write().expect("kb lock poisoned");
            learning::install_category(&mut kb, &record, owner.as_deref())
        };
        match installed {
            Ok(normalized) => {
                counter!("engine_learned_total").increment(1);
                if persist {
                    ctx.pending.push(PersistEffect::Append {
                        record: normalized,
                        source: ctx.session.id.clone(),
                    });
                }
            }
            Err(err) => ctx.diagnostics.push(err.to_string()),
        }
    }
    String::new()
}

/// The evaluated body names a pattern; every category matching it is
/// removed. An absent target is a no-op.
pub fn unlearn(body: String, ctx: &mut EvalContext, persist: bool) -> String {
    let pattern = normalize_pattern(&body);
    if pattern.is_empty() {
        return String::new();
    }
    let removed = {
        let mut kb = ctx.kb.write().expect("kb lock poisoned");
        learning::remove_pattern(&mut kb, &pattern, Some(&ctx.session.id))
    };
    if removed == 0 {
        ctx.diagnostics
            .push(EngineError::CategoryNotFound(pattern.clone()).to_string());
    } else {
        counter!("engine_unlearned_total").increment(removed as u64);
    }
    if persist {
        ctx.pending.push(PersistEffect::Remove { pattern });
    }
    String::new()
}

/// Pattern-side source: text stays literal, `<eval>` evaluates now, any
/// other markup re-serializes untouched.
fn literal_source(nodes: &[Node], ctx: &mut EvalContext) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) if el.name == "eval" => out.push_str(&eval_nodes(&el.children, ctx)),
            other => out.push_str(&node_to_source(other)),
        }
    }
    out
}

/// Template-side source: reference tags survive verbatim, `<eval>` and
/// everything else evaluates eagerly.
fn preserved_source(nodes: &[Node], ctx: &mut EvalContext) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Element(el) if el.name == "eval" => out.push_str(&eval_nodes(&el.children, ctx)),
            Node::Element(el) if PRESERVED.contains(&el.name.as_str()) => {
                out.push_str(&node_to_source(node));
            }
            Node::Element(_) => out.push_str(&eval_node(node, ctx)),
            other => out.push_str(&node_to_source(other)),
        }
    }
    out
}

fn child_elements<'e>(el: &'e Element, name: &str) -> Vec<&'e Element> {
    el.children
        .iter()
        .filter_map(|n| match n {
            Node::Element(child) if child.name == name => Some(child),
            _ => None,
        })
        .collect()
}

fn child_element<'e>(el: &'e Element, name: &str) -> Option<&'e Element> {
    child_elements(el, name).into_iter().next()
}
