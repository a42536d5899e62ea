//! Variable I/O tags and the scope resolution chain.
//!
//! Reads walk local → session → topic → global → property and return empty
//! when every scope misses. Writes land in the session scope; properties
//! are read-only bot constants. Setting the reserved name `topic` switches
//! the session topic instead of writing a variable.

use crate::ast::Element;
use crate::normalize::normalize_input;

use super::EvalContext;

/// Innermost-scope-wins read used by `get` and `condition`.
pub fn read_value(ctx: &EvalContext, name: &str) -> String {
    if let Some(v) = ctx.locals.get(&name.to_lowercase()) {
        return v.clone();
    }
    if let Some(v) = ctx.session.variable(name) {
        return v.to_string();
    }
    let kb = ctx.kb.read().expect("kb lock poisoned");
    if let Some(v) = kb.topic_var(&ctx.session.topic, name) {
        return v.to_string();
    }
    if let Some(v) = kb.global(name) {
        return v.to_string();
    }
    if let Some(v) = kb.property(name) {
        return v.to_string();
    }
    String::new()
}

pub fn get(el: &Element, ctx: &mut EvalContext) -> String {
    match el.attr("name") {
        Some(name) if !name.trim().is_empty() => read_value(ctx, name.trim()),
        _ => String::new(),
    }
}

pub fn set(el: &Element, body: String, ctx: &mut EvalContext) -> String {
    let Some(name) = el.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
        return String::new();
    };
    let value = body.trim().to_string();
    if name.eq_ignore_ascii_case("topic") {
        ctx.session.topic = normalize_input(&value);
    } else {
        ctx.session.set_variable(name, &value);
    }
    String::new()
}

pub fn var(el: &Element, body: String, ctx: &mut EvalContext) -> String {
    let Some(name) = el.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
        return String::new();
    };
    ctx.locals.insert(name.to_lowercase(), body.trim().to_string());
    String::new()
}

pub fn bot(el: &Element, ctx: &mut EvalContext) -> String {
    let Some(name) = el.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
        return String::new();
    };
    let kb = ctx.kb.read().expect("kb lock poisoned");
    kb.property(name).unwrap_or_default().to_string()
}
