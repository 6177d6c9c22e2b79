//! Tree Model
//!
//! Owned, lifetime-free syntax tree lowered from the oxc arena AST.
//! A `TreeModel` exclusively owns its nodes: no node is shared between two
//! live trees, so rewriters mutate fields in place without aliasing.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════════
// POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte range into the source text a tree was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.start as usize..self.end as usize)
            .unwrap_or("")
    }
}

impl From<oxc_span::Span> for Span {
    fn from(span: oxc_span::Span) -> Self {
        Self::new(span.start, span.end)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LITERAL VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// A regular-expression literal value, rebuilt from `raw` before generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegexValue {
    pub pattern: String,
    pub flags: String,
}

impl RegexValue {
    pub fn to_source(&self) -> String {
        format!("/{}/{}", self.pattern, self.flags)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Regex(RegexValue),
}

impl LiteralValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for LiteralValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LiteralValue::String(s) => serializer.serialize_str(s),
            LiteralValue::Number(n) => serializer.serialize_f64(*n),
            LiteralValue::Boolean(b) => serializer.serialize_bool(*b),
            LiteralValue::Null => serializer.serialize_unit(),
            LiteralValue::Regex(regex) => regex.serialize(serializer),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Index path from the root to a node, one child index per level.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: String,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<LiteralValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: impl Into<String>, span: Span) -> Self {
        Self {
            kind: kind.into(),
            span,
            name: None,
            value: None,
            raw: None,
            children: Vec::new(),
        }
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn is_string_literal(&self) -> bool {
        self.kind == "Literal" && matches!(self.value, Some(LiteralValue::String(_)))
    }

    /// Replaces a string literal's value and re-renders its `raw` form,
    /// keeping the original quote character.
    pub fn set_string_value(&mut self, value: &str) {
        let quote = self
            .raw
            .as_deref()
            .and_then(|raw| raw.chars().next())
            .filter(|c| *c == '\'' || *c == '"')
            .unwrap_or('\'');
        self.raw = Some(quote_string(value, quote));
        self.value = Some(LiteralValue::String(value.to_string()));
    }

    pub fn at(&self, path: &[usize]) -> Option<&Node> {
        let mut node = self;
        for &index in path {
            node = node.children.get(index)?;
        }
        Some(node)
    }

    pub fn at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &index in path {
            node = node.children.get_mut(index)?;
        }
        Some(node)
    }

    /// Compares kind, names, values and shape, ignoring spans.
    pub fn structurally_eq(&self, other: &Node) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.value == other.value
            && self.raw == other.raw
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.structurally_eq(b))
    }
}

fn quote_string(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommentKind {
    Line,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "type")]
    pub kind: CommentKind,
    /// Comment text without its `//` or `/* */` delimiters.
    pub value: String,
    /// Span including the delimiters.
    pub span: Span,
}

impl Comment {
    pub fn to_source(&self) -> String {
        match self.kind {
            CommentKind::Line => format!("//{}", self.value),
            CommentKind::Block => format!("/*{}*/", self.value),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE MODEL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeModel {
    #[serde(skip)]
    pub(crate) source: String,
    pub program: Node,
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading_comments: Option<Vec<Comment>>,
    /// Parsed names of identifiers written with escapes, keyed by span.
    #[serde(skip)]
    pub(crate) escaped_names: BTreeMap<Span, String>,
}

impl TreeModel {
    pub(crate) fn new(source: String, program: Node, comments: Vec<Comment>) -> Self {
        Self {
            source,
            program,
            comments,
            leading_comments: None,
            escaped_names: BTreeMap::new(),
        }
    }

    /// A tree with no body and no comments, as held by a file before its
    /// first load.
    pub fn empty() -> Self {
        Self::new(String::new(), Node::new("Program", Span::default()), Vec::new())
    }

    /// The source text this tree was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The metadata carrier, if the file has any comment.
    pub fn first_comment(&self) -> Option<&Comment> {
        self.comments.first()
    }

    pub fn structurally_eq(&self, other: &TreeModel) -> bool {
        self.program.structurally_eq(&other.program)
    }
}

impl Default for TreeModel {
    fn default() -> Self {
        Self::empty()
    }
}
