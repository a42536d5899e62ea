//! History references: `that`, `request`, `response`, `input`, `topic`.
//!
//! Histories are appended only after a turn's evaluation completes, so
//! these tags always observe pre-turn state; `input` alone refers to the
//! turn in progress.

use crate::ast::Element;

use super::{index_attr, EvalContext};

pub fn history(el: &Element, ctx: &mut EvalContext) -> String {
    let index = index_attr(el);
    match el.name.as_str() {
        "that" => ctx.session.get_that_by_index(index).unwrap_or_default().to_string(),
        "request" => ctx
            .session
            .get_request_by_index(index)
            .unwrap_or_default()
            .to_string(),
        "response" => ctx
            .session
            .get_response_by_index(index)
            .unwrap_or_default()
            .to_string(),
        "input" => ctx.input.clone(),
        "topic" => ctx.session.topic.clone(),
        _ => String::new(),
    }
}
