//! System information tags and the RDF-triple helpers.

use crate::ast::Element;

use super::EvalContext;

pub fn system(el: &Element, ctx: &mut EvalContext) -> String {
    let kb = ctx.kb.read().expect("kb lock poisoned");
    match el.name.as_str() {
        "size" => kb.index.size(Some(&ctx.session.id)).to_string(),
        "version" => kb.property("version").unwrap_or_default().to_string(),
        "id" => kb.property("id").unwrap_or_default().to_string(),
        "vocabulary" => kb.vocabulary().to_string(),
        _ => String::new(),
    }
}

/// `subj`/`pred`/`obj` trim their evaluated bodies and contribute one
/// space-separated component each; `uniq` collapses the assembled triple.
pub fn rdf(el: &Element, body: String) -> String {
    match el.name.as_str() {
        "uniq" => body.split_whitespace().collect::<Vec<_>>().join(" "),
        "subj" | "pred" | "obj" => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{trimmed} ")
            }
        }
        _ => body,
    }
}
