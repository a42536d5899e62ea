//! # Template Evaluator
//! Post-order walk over the template AST with one dispatch site.
//!
//! Children evaluate before their parent for every tag except the
//! selective ones (`random`, `condition`, `learn`, `learnf`), which decide
//! themselves what to evaluate. Every handler returns a string; there is no
//! error channel inside a template; failures degrade to empty output and,
//! where useful, an advisory diagnostic on the context.

pub mod collections;
pub mod control;
pub mod datetime;
pub mod external;
pub mod history_tags;
pub mod learn;
pub mod person;
pub mod system;
pub mod text;
pub mod vars;

use std::collections::HashMap;
use std::sync::RwLock;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::ast::{Element, Node};
use crate::kb::KnowledgeBase;
use crate::learning::PersistEffect;
use crate::matcher::FuzzyContextConfig;
use crate::services::{ServiceCache, ServiceRegistry};
use crate::session::Session;

pub use datetime::{Clock, FixedClock, SystemClock};

/// Source of choice for `random` and `shuffle`; injected so tests are
/// deterministic.
pub trait Chooser: Send + Sync {
    /// Pick an index in `0..len`. Never called with `len == 0`.
    fn pick(&self, len: usize) -> usize;

    fn shuffle(&self, items: &mut [String]) {
        let len = items.len();
        for i in (1..len).rev() {
            items.swap(i, self.pick(i + 1));
        }
    }
}

#[derive(Debug, Default)]
pub struct RandomChooser;

impl Chooser for RandomChooser {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }

    fn shuffle(&self, items: &mut [String]) {
        items.shuffle(&mut rand::thread_rng());
    }
}

/// Always picks the same slot (clamped); keeps tests reproducible.
#[derive(Debug, Default)]
pub struct FixedChooser(pub usize);

impl Chooser for FixedChooser {
    fn pick(&self, len: usize) -> usize {
        self.0.min(len - 1)
    }

    fn shuffle(&self, _items: &mut [String]) {}
}

/// Per-evaluation bundle: borrows of the shared state plus the wildcard
/// captures, local scope, and recursion depth of this call.
pub struct EvalContext<'a> {
    pub kb: &'a RwLock<KnowledgeBase>,
    pub session: &'a mut Session,
    pub services: &'a RwLock<ServiceRegistry>,
    pub service_cache: &'a ServiceCache,
    pub clock: &'a dyn Clock,
    pub chooser: &'a dyn Chooser,
    pub recursion_limit: u32,
    pub fuzzy: FuzzyContextConfig,
    /// The raw input of the turn in progress.
    pub input: String,
    pub stars: Vec<String>,
    pub that_stars: Vec<String>,
    pub topic_stars: Vec<String>,
    pub locals: HashMap<String, String>,
    pub depth: u32,
    /// Durable effects, committed by the engine after evaluation returns.
    pub pending: Vec<PersistEffect>,
    pub diagnostics: Vec<String>,
}

impl<'a> EvalContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kb: &'a RwLock<KnowledgeBase>,
        session: &'a mut Session,
        services: &'a RwLock<ServiceRegistry>,
        service_cache: &'a ServiceCache,
        clock: &'a dyn Clock,
        chooser: &'a dyn Chooser,
        recursion_limit: u32,
        fuzzy: FuzzyContextConfig,
        input: String,
    ) -> Self {
        Self {
            kb,
            session,
            services,
            service_cache,
            clock,
            chooser,
            recursion_limit,
            fuzzy,
            input,
            stars: Vec::new(),
            that_stars: Vec::new(),
            topic_stars: Vec::new(),
            locals: HashMap::new(),
            depth: 0,
            pending: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// `star`-style capture by 1-based index.
    pub fn star(&self, index: usize) -> &str {
        index
            .checked_sub(1)
            .and_then(|i| self.stars.get(i))
            .map_or("", String::as_str)
    }
}

/// Evaluate a full template (the root node sequence) to the reply text.
pub fn evaluate_template(nodes: &[Node], ctx: &mut EvalContext) -> String {
    eval_nodes(nodes, ctx)
}

pub fn eval_nodes(nodes: &[Node], ctx: &mut EvalContext) -> String {
    let mut out = String::new();
    for node in nodes {
        out.push_str(&eval_node(node, ctx));
    }
    out
}

pub fn eval_node(node: &Node, ctx: &mut EvalContext) -> String {
    match node {
        Node::Text(t) => t.clone(),
        Node::Comment(_) => String::new(),
        Node::Cdata(c) => c.clone(),
        Node::Element(el) => eval_element(el, ctx),
    }
}

fn eval_element(el: &Element, ctx: &mut EvalContext) -> String {
    // Selective tags inspect their children themselves.
    match el.name.as_str() {
        "random" => return control::random(el, ctx),
        "condition" => return control::condition(el, ctx),
        "learn" => return learn::learn(el, ctx, false),
        "learnf" => return learn::learn(el, ctx, true),
        _ => {}
    }

    let body = eval_nodes(&el.children, ctx);
    match el.name.as_str() {
        // Variable I/O
        "get" => vars::get(el, ctx),
        "set" => vars::set(el, body, ctx),
        "var" => vars::var(el, body, ctx),
        "bot" => vars::bot(el, ctx),
        "think" => String::new(),

        // Wildcard references
        "star" => ctx.star(index_attr(el)).to_string(),
        "thatstar" => indexed(&ctx.that_stars, index_attr(el)),
        "topicstar" => indexed(&ctx.topic_stars, index_attr(el)),
        "sr" => {
            let star = ctx.star(1).to_string();
            control::srai_text(star, ctx)
        }

        // Recursion / external
        "srai" => control::srai_text(body, ctx),
        "sraix" => external::sraix(el, body, ctx),

        // History
        "that" | "request" | "response" | "input" | "topic" => history_tags::history(el, ctx),

        // Collections
        "map" => collections::map(el, body, ctx),
        "list" | "array" => collections::list(el, body, ctx),

        // Text transforms
        "uppercase" | "lowercase" | "formal" | "capitalize" | "sentence" | "explode" | "reverse"
        | "acronym" | "trim" | "substring" | "replace" | "pluralize" | "shuffle" | "length"
        | "count" | "split" | "join" | "unique" | "indent" | "dedent" | "repeat" | "first"
        | "rest" | "normalize" | "denormalize" => text::transform(el, body, ctx),

        // Pronoun transforms
        "person" => person::person(&body),
        "person2" => person::person2(&body),
        "gender" => person::gender(&body),

        // Date/time
        "date" | "time" => datetime::render(el, ctx),
        "interval" => datetime::interval(el, ctx),

        // System
        "size" | "version" | "id" | "vocabulary" => system::system(el, ctx),
        "uniq" | "subj" | "pred" | "obj" => system::rdf(el, body),

        // Learning (post-order variants)
        "unlearn" => learn::unlearn(body, ctx, false),
        "unlearnf" => learn::unlearn(body, ctx, true),

        // Structural tags that pass through outside their parents.
        "li" | "eval" | "template" => body,
        "loop" => String::new(),

        _ => unknown_tag(el, body),
    }
}

/// Unknown tags echo themselves with their evaluated content so authoring
/// mistakes stay visible in the reply instead of vanishing.
fn unknown_tag(el: &Element, body: String) -> String {
    let mut out = String::new();
    out.push('<');
    out.push_str(&el.name);
    for (k, v) in &el.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(v);
        out.push('"');
    }
    if el.self_closing {
        out.push_str("/>");
    } else {
        out.push('>');
        out.push_str(&body);
        out.push_str("</");
        out.push_str(&el.name);
        out.push('>');
    }
    out
}

/// 1-based `index` attribute, defaulting to 1.
pub(crate) fn index_attr(el: &Element) -> usize {
    el.attr("index")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
}

fn indexed(items: &[String], index: usize) -> String {
    index
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .cloned()
        .unwrap_or_default()
}
