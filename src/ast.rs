//! # Template AST
//! Hand-rolled scanner turning template markup into a node tree.
//!
//! The grammar is deliberately forgiving: templates come from hand-written
//! category files and from learned strings, so the parser recovers instead
//! of failing. A tag whose closing form never appears is downgraded to a
//! text node holding the original source span, and stray closing tags pass
//! through as text. Entity references in text decode to their characters.

use std::borrow::Cow;

/// Tag names that close themselves when followed by end-of-input,
/// whitespace, or another `<`.
const IMPLICIT_SELF_CLOSING: &[&str] = &[
    "star", "sr", "get", "bot", "that", "input", "loop", "date", "time", "size", "version", "id",
    "request", "response", "repeat", "topic", "subj", "pred", "obj", "uniq",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Comment(String),
    Cdata(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub self_closing: bool,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a template string into its top-level node sequence.
pub fn parse_template(src: &str) -> Vec<Node> {
    let mut parser = Parser { src, pos: 0 };
    let (nodes, _) = parser.parse_nodes(None);
    nodes
}

/// Re-serialize a node to template source. Used when learned templates must
/// keep reference tags verbatim, and for echoing unknown tags.
pub fn node_to_source(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node);
    out
}

/// Re-serialize a node sequence.
pub fn nodes_to_source(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(t) => out.push_str(&encode_entities(t)),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::Cdata(c) => {
            out.push_str("<![CDATA[");
            out.push_str(c);
            out.push_str("]]>");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (k, v) in &el.attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&v.replace('"', "&quot;"));
                out.push('"');
            }
            if el.self_closing {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in &el.children {
                    write_node(out, child);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }
}

fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    match html_escape::decode_html_entities(text) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parse until end-of-input or the matching closing tag of `closing`.
    /// Returns the nodes plus whether the closing tag was consumed.
    fn parse_nodes(&mut self, closing: Option<&str>) -> (Vec<Node>, bool) {
        let mut nodes = Vec::new();
        let mut text_start = self.pos;

        while self.pos < self.src.len() {
            if self.peek() != Some('<') {
                self.pos += self.char_len();
                continue;
            }

            // Closing tag for the current element?
            if let Some(name) = closing {
                if let Some(end) = self.try_closing(name) {
                    flush_text(&mut nodes, self.src, text_start, self.pos);
                    self.pos = end;
                    return (nodes, true);
                }
            }

            let mark = self.pos;
            if let Some(node) = self.try_markup() {
                flush_text(&mut nodes, self.src, text_start, mark);
                nodes.push(node);
                text_start = self.pos;
            } else {
                // Bare '<' that opens nothing; keep it as text.
                self.pos = mark + 1;
            }
        }

        flush_text(&mut nodes, self.src, text_start, self.pos);
        (nodes, false)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn char_len(&self) -> usize {
        self.peek().map(char::len_utf8).unwrap_or(1)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// If the cursor sits on `</name>` (for the expected name), return the
    /// position just past it.
    fn try_closing(&self, name: &str) -> Option<usize> {
        let rest = self.rest();
        let inner = rest.strip_prefix("</")?;
        let body_end = inner.find('>')?;
        if inner[..body_end].trim().eq_ignore_ascii_case(name) {
            Some(self.pos + 2 + body_end + 1)
        } else {
            None
        }
    }

    /// Try to parse markup at a '<'. Returns None when it is plain text.
    fn try_markup(&mut self) -> Option<Node> {
        let rest = self.rest();

        if let Some(after) = rest.strip_prefix("<!--") {
            let node = match after.find("-->") {
                Some(end) => {
                    self.pos += 4 + end + 3;
                    Node::Comment(after[..end].to_string())
                }
                None => {
                    // Unterminated comment swallows the rest.
                    self.pos = self.src.len();
                    Node::Comment(after.to_string())
                }
            };
            return Some(node);
        }

        if let Some(after) = rest.strip_prefix("<![CDATA[") {
            let node = match after.find("]]>") {
                Some(end) => {
                    self.pos += 9 + end + 3;
                    Node::Cdata(after[..end].to_string())
                }
                None => {
                    self.pos = self.src.len();
                    Node::Cdata(after.to_string())
                }
            };
            return Some(node);
        }

        if rest.starts_with("</") {
            // Stray closing tag: pass it through as text.
            let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            let node = Node::Text(rest[..end].to_string());
            self.pos += end;
            return Some(node);
        }

        self.try_element()
    }

    fn try_element(&mut self) -> Option<Node> {
        let start = self.pos;
        let rest = self.rest();
        let inner = rest.strip_prefix('<')?;
        let name_len = inner
            .char_indices()
            .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .count();
        if name_len == 0 || !inner.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let name = inner[..name_len].to_ascii_lowercase();
        self.pos = start + 1 + name_len;

        let attrs = match self.parse_attrs() {
            Some(attrs) => attrs,
            None => {
                // No closing '>' before end-of-input: the whole span is text.
                let node = Node::Text(self.src[start..].to_string());
                self.pos = self.src.len();
                return Some(node);
            }
        };

        // parse_attrs leaves the cursor on '>' or '/>'.
        if self.rest().starts_with("/>") {
            self.pos += 2;
            return Some(Node::Element(Element {
                name,
                attrs,
                children: Vec::new(),
                self_closing: true,
            }));
        }
        self.pos += 1; // consume '>'

        let next = self.peek();
        let implicitly_closed = IMPLICIT_SELF_CLOSING.contains(&name.as_str())
            && (next.is_none() || next.is_some_and(|c| c.is_whitespace() || c == '<'));
        if implicitly_closed {
            return Some(Node::Element(Element {
                name,
                attrs,
                children: Vec::new(),
                self_closing: true,
            }));
        }

        let (children, closed) = self.parse_nodes(Some(&name));
        if closed {
            Some(Node::Element(Element {
                name,
                attrs,
                children,
                self_closing: false,
            }))
        } else {
            // Closing tag never found: recover with the original span.
            self.pos = self.src.len();
            Some(Node::Text(self.src[start..].to_string()))
        }
    }

    /// Parse attributes up to (but not past) '>' or '/>'.
    /// Returns None if end-of-input arrives first.
    fn parse_attrs(&mut self) -> Option<Vec<(String, String)>> {
        let mut attrs = Vec::new();
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.pos += self.char_len();
            }
            match self.peek() {
                None => return None,
                Some('>') => return Some(attrs),
                Some('/') if self.rest().starts_with("/>") => return Some(attrs),
                _ => {}
            }

            let name_start = self.pos;
            while self
                .peek()
                .is_some_and(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
            {
                self.pos += self.char_len();
            }
            let name = self.src[name_start..self.pos].to_ascii_lowercase();
            if name.is_empty() {
                // Stray '/' not part of '/>'; skip it.
                self.pos += self.char_len();
                continue;
            }

            if self.peek() != Some('=') {
                attrs.push((name, String::new()));
                continue;
            }
            self.pos += 1; // consume '='

            let value = self.parse_attr_value()?;
            attrs.push((name, value));
        }
    }

    fn parse_attr_value(&mut self) -> Option<String> {
        let rest = self.rest();

        // Backslash-escaped double quotes, as seen in JSON-embedded markup:
        // name=\"foo\"
        if let Some(after) = rest.strip_prefix("\\\"") {
            let end = after.find("\\\"")?;
            self.pos += 2 + end + 2;
            return Some(decode_entities(&after[..end]));
        }

        match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let after = &rest[1..];
                match after.find(q) {
                    Some(end) => {
                        self.pos += 1 + end + 1;
                        Some(decode_entities(&after[..end]))
                    }
                    None => None,
                }
            }
            Some(_) => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| !c.is_whitespace() && c != '>' && !(c == '/' && self.rest().starts_with("/>")))
                {
                    self.pos += self.char_len();
                }
                Some(self.src[start..self.pos].to_string())
            }
            None => None,
        }
    }
}

fn flush_text(nodes: &mut Vec<Node>, src: &str, start: usize, end: usize) {
    if end > start {
        nodes.push(Node::Text(decode_entities(&src[start..end])));
    }
}
