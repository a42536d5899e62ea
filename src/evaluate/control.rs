//! Selection and recursion tags: `random`, `condition` (with `loop`),
//! `srai`, and the `sr` shorthand.

use metrics::counter;

use crate::ast::{Element, Node};
use crate::error::EngineError;
use crate::matcher::{self, MatchQuery};
use crate::normalize::normalize_input;

use super::{eval_nodes, vars, EvalContext};

/// Iteration cap for `condition` bodies that request a re-run via `<loop/>`.
const LOOP_LIMIT: usize = 100;

/// Reduce a computed string: re-match it as input and evaluate the winning
/// template with a fresh local scope one level deeper.
///
/// No match emits the computed string unchanged; hitting the recursion cap
/// fails closed with an empty string.
pub fn srai_text(body: String, ctx: &mut EvalContext) -> String {
    if ctx.depth + 1 >= ctx.recursion_limit {
        counter!("engine_recursion_stops_total").increment(1);
        ctx.diagnostics
            .push(EngineError::RecursionLimit(ctx.recursion_limit).to_string());
        return String::new();
    }

    let normalized = normalize_input(&body);
    if normalized.is_empty() {
        return body;
    }

    let that = ctx
        .session
        .thats
        .peek(1)
        .map(normalize_input)
        .unwrap_or_default();
    let topic = ctx.session.topic.clone();
    let resolved = {
        let kb = ctx.kb.read().expect("kb lock poisoned");
        matcher::resolve(
            &kb,
            &MatchQuery {
                input: &normalized,
                that: &that,
                topic: &topic,
                session: Some(&ctx.session.id),
            },
            &ctx.fuzzy,
        )
    };
    let Some(matched) = resolved else {
        return body;
    };

    // The reduction runs with its own captures and locals; restore ours
    // afterwards.
    let saved_stars = std::mem::replace(&mut ctx.stars, matched.stars);
    let saved_that_stars = std::mem::replace(&mut ctx.that_stars, matched.that_stars);
    let saved_topic_stars = std::mem::replace(&mut ctx.topic_stars, matched.topic_stars);
    let saved_locals = std::mem::take(&mut ctx.locals);
    ctx.depth += 1;

    let out = eval_nodes(&matched.category.nodes, ctx);

    ctx.depth -= 1;
    ctx.locals = saved_locals;
    ctx.stars = saved_stars;
    ctx.that_stars = saved_that_stars;
    ctx.topic_stars = saved_topic_stars;
    out
}

/// Uniform choice over `li` children; only the chosen child evaluates.
pub fn random(el: &Element, ctx: &mut EvalContext) -> String {
    let items: Vec<&Element> = list_items(el);
    if items.is_empty() {
        return String::new();
    }
    let chosen = items[ctx.chooser.pick(items.len())];
    eval_nodes(&chosen.children, ctx)
}

/// `condition name=N [value=V]`: single-branch form, or `li value=…`
/// children with a trailing default `li`. Only the selected branch
/// evaluates; a `<loop/>` inside it re-runs the selection, bounded.
pub fn condition(el: &Element, ctx: &mut EvalContext) -> String {
    let Some(name) = el.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
        return String::new();
    };

    if let Some(expected) = el.attr("value") {
        if value_matches(ctx, name, expected) {
            return eval_nodes(&el.children, ctx);
        }
        return String::new();
    }

    let mut out = String::new();
    for _ in 0..LOOP_LIMIT {
        let Some(branch) = select_branch(el, ctx, name) else {
            break;
        };
        out.push_str(&eval_nodes(&branch.children, ctx));
        if !wants_loop(branch) {
            break;
        }
    }
    out
}

fn select_branch<'e>(el: &'e Element, ctx: &EvalContext, name: &str) -> Option<&'e Element> {
    let mut default = None;
    for item in list_items(el) {
        match item.attr("value") {
            Some(expected) => {
                // An li may test its own predicate instead of the
                // condition-level one.
                let li_name = item.attr("name").unwrap_or(name);
                if value_matches(ctx, li_name, expected) {
                    return Some(item);
                }
            }
            None => {
                if default.is_none() {
                    default = Some(item);
                }
            }
        }
    }
    default
}

fn value_matches(ctx: &EvalContext, name: &str, expected: &str) -> bool {
    vars::read_value(ctx, name)
        .trim()
        .eq_ignore_ascii_case(expected.trim())
}

fn wants_loop(el: &Element) -> bool {
    el.children
        .iter()
        .any(|n| matches!(n, Node::Element(child) if child.name == "loop"))
}

fn list_items(el: &Element) -> Vec<&Element> {
    el.children
        .iter()
        .filter_map(|n| match n {
            Node::Element(child) if child.name == "li" => Some(child),
            _ => None,
        })
        .collect()
}
