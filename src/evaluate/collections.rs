//! Collection tags: `map` lookups and `list`/`array` operations on the
//! named sequences owned by the knowledge base.

use crate::ast::Element;

use super::{index_attr, EvalContext};

/// `map name=N`: look the evaluated body up; a missing key echoes the body
/// unchanged so chained lookups degrade gracefully.
pub fn map(el: &Element, body: String, ctx: &mut EvalContext) -> String {
    let Some(name) = el.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
        return String::new();
    };
    let kb = ctx.kb.read().expect("kb lock poisoned");
    match kb.map_lookup(name, body.trim()) {
        Some(value) => value.to_string(),
        None => body,
    }
}

/// `list name=N operation=op` (alias `array`): `add` appends the evaluated
/// body, `get` reads by 1-based `index`, `size` reports the length, and
/// `clear` empties the sequence.
pub fn list(el: &Element, body: String, ctx: &mut EvalContext) -> String {
    let Some(name) = el.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
        return String::new();
    };
    let operation = el.attr("operation").map(str::trim).unwrap_or("get");

    match operation {
        "add" | "append" | "push" => {
            let value = body.trim().to_string();
            if value.is_empty() {
                return String::new();
            }
            let mut kb = ctx.kb.write().expect("kb lock poisoned");
            kb.list_push(name, value);
            String::new()
        }
        "get" => {
            let kb = ctx.kb.read().expect("kb lock poisoned");
            kb.list_get(name, index_attr(el)).unwrap_or_default().to_string()
        }
        "size" | "length" => {
            let kb = ctx.kb.read().expect("kb lock poisoned");
            kb.list_len(name).to_string()
        }
        "clear" => {
            let mut kb = ctx.kb.write().expect("kb lock poisoned");
            kb.list_clear(name);
            String::new()
        }
        _ => String::new(),
    }
}
