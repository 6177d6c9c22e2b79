//! Structural matching over a `Node` tree.
//!
//! Selectors follow a small subset of the ESTree selector syntax:
//! - `Identifier` matches nodes by kind, `*` matches any node
//! - `Identifier[name="foo"]` filters on `name`, `value` or `raw`
//! - `FunctionDeclaration Identifier` matches descendants
//! - `VariableDeclarator > CallExpression` matches direct children
//! - `A, B` matches either alternative

use std::iter::Peekable;
use std::str::{CharIndices, FromStr};
use thiserror::Error;

use crate::tree::{LiteralValue, Node, NodePath};
use crate::visitor::{walk_node, Ancestry, NodeVisitor};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("Unexpected end of selector")]
    UnexpectedEnd,

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTOR MODEL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKey {
    Name,
    Value,
    Raw,
}

impl FromStr for AttributeKey {
    type Err = SelectorError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "name" => Ok(AttributeKey::Name),
            "value" => Ok(AttributeKey::Value),
            "raw" => Ok(AttributeKey::Raw),
            other => Err(SelectorError::UnknownAttribute(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub key: AttributeKey,
    /// `None` only checks that the attribute is present.
    pub value: Option<String>,
}

impl AttributeFilter {
    fn matches(&self, node: &Node) -> bool {
        let actual = match self.key {
            AttributeKey::Name => node.name.clone(),
            AttributeKey::Raw => node.raw.clone(),
            AttributeKey::Value => node.value.as_ref().map(|value| match value {
                LiteralValue::String(s) => s.clone(),
                LiteralValue::Number(n) => n.to_string(),
                LiteralValue::Boolean(b) => b.to_string(),
                LiteralValue::Null => "null".to_string(),
                LiteralValue::Regex(regex) => regex.to_source(),
            }),
        };
        match (&self.value, actual) {
            (None, actual) => actual.is_some(),
            (Some(expected), Some(actual)) => *expected == actual,
            (Some(_), None) => false,
        }
    }
}

/// One node test: an optional kind plus attribute filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub kind: Option<String>,
    pub attributes: Vec<AttributeFilter>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        self.kind.as_deref().map_or(true, |kind| node.kind == kind)
            && self.attributes.iter().all(|attr| attr.matches(node))
    }
}

/// A chain of compounds; `ancestors[i].1` relates `ancestors[i].0` to the
/// compound on its right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complex {
    pub ancestors: Vec<(Compound, Combinator)>,
    pub subject: Compound,
}

impl Complex {
    fn matches(&self, node: &Node, ancestors: &[&Node]) -> bool {
        self.subject.matches(node) && match_chain(&self.ancestors, ancestors)
    }
}

fn match_chain(chain: &[(Compound, Combinator)], ancestors: &[&Node]) -> bool {
    let Some(((compound, combinator), rest)) = chain.split_last() else {
        return true;
    };
    match combinator {
        Combinator::Child => match ancestors.split_last() {
            Some((parent, above)) => compound.matches(parent) && match_chain(rest, above),
            None => false,
        },
        Combinator::Descendant => (0..ancestors.len())
            .rev()
            .any(|i| compound.matches(ancestors[i]) && match_chain(rest, &ancestors[..i])),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

impl Selector {
    /// Matches every node of `kind`.
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            alternatives: vec![Complex {
                ancestors: Vec::new(),
                subject: Compound {
                    kind: Some(kind.into()),
                    attributes: Vec::new(),
                },
            }],
        }
    }

    /// Adds an exact attribute filter to the matched node.
    pub fn with_attribute(mut self, key: AttributeKey, value: impl Into<String>) -> Self {
        let value = value.into();
        for complex in &mut self.alternatives {
            complex.subject.attributes.push(AttributeFilter {
                key,
                value: Some(value.clone()),
            });
        }
        self
    }

    /// Restricts matches to nodes with an ancestor of `kind`.
    pub fn within(self, kind: impl Into<String>) -> Self {
        self.prepend(kind.into(), Combinator::Descendant)
    }

    /// Restricts matches to nodes whose parent is of `kind`.
    pub fn child_of(self, kind: impl Into<String>) -> Self {
        self.prepend(kind.into(), Combinator::Child)
    }

    fn prepend(mut self, kind: String, combinator: Combinator) -> Self {
        for complex in &mut self.alternatives {
            complex.ancestors.insert(
                0,
                (
                    Compound {
                        kind: Some(kind.clone()),
                        attributes: Vec::new(),
                    },
                    combinator,
                ),
            );
        }
        self
    }

    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        SelectorParser::new(input).parse()
    }

    pub fn matches(&self, node: &Node, ancestors: &[&Node]) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches(node, ancestors))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Selector::parse(input)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTOR PARSER
// ═══════════════════════════════════════════════════════════════════════════════

struct SelectorParser<'s> {
    input: &'s str,
    chars: Peekable<CharIndices<'s>>,
}

impl<'s> SelectorParser<'s> {
    fn new(input: &'s str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn unexpected(&mut self) -> SelectorError {
        match self.chars.peek() {
            Some(&(position, character)) => SelectorError::UnexpectedCharacter {
                character,
                position,
            },
            None => SelectorError::UnexpectedEnd,
        }
    }

    /// Returns whether any whitespace was consumed.
    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
            skipped = true;
        }
        skipped
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        if self.peek() == Some(expected) {
            self.chars.next();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        if self.input.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut alternatives = vec![self.parse_complex()?];
        while self.peek() == Some(',') {
            self.chars.next();
            alternatives.push(self.parse_complex()?);
        }
        if self.peek().is_some() {
            return Err(self.unexpected());
        }
        Ok(Selector { alternatives })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        self.skip_whitespace();
        let mut ancestors = Vec::new();
        let mut subject = self.parse_compound()?;

        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.chars.next();
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_whitespace => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            let next = self.parse_compound()?;
            ancestors.push((std::mem::replace(&mut subject, next), combinator));
        }

        Ok(Complex { ancestors, subject })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let kind = match self.peek() {
            Some('*') => {
                self.chars.next();
                None
            }
            Some('[') => None,
            Some(c) if is_word_char(c) => Some(self.parse_word()),
            _ => return Err(self.unexpected()),
        };

        let mut attributes = Vec::new();
        while self.peek() == Some('[') {
            self.chars.next();
            self.skip_whitespace();
            let word = self.parse_word();
            if word.is_empty() {
                return Err(self.unexpected());
            }
            let key: AttributeKey = word.parse()?;
            self.skip_whitespace();
            let value = if self.peek() == Some('=') {
                self.chars.next();
                self.skip_whitespace();
                Some(self.parse_value()?)
            } else {
                None
            };
            self.skip_whitespace();
            self.expect(']')?;
            attributes.push(AttributeFilter { key, value });
        }

        Ok(Compound { kind, attributes })
    }

    fn parse_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|c| is_word_char(*c)) {
            word.push(c);
            self.chars.next();
        }
        word
    }

    fn parse_value(&mut self) -> Result<String, SelectorError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            Some(c) if is_word_char(c) => return Ok(self.parse_word()),
            _ => return Err(self.unexpected()),
        };
        self.chars.next();

        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => return Err(SelectorError::UnexpectedEnd),
                },
                Some((_, c)) if c == quote => return Ok(value),
                Some((_, c)) => value.push(c),
                None => return Err(SelectorError::UnexpectedEnd),
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | '.')
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCHING
// ═══════════════════════════════════════════════════════════════════════════════

struct MatchCollector<'t, 's> {
    selector: &'s Selector,
    matches: Vec<(&'t Node, NodePath)>,
}

impl<'t> NodeVisitor<'t> for MatchCollector<'t, '_> {
    fn visit_node(&mut self, node: &'t Node, ancestry: &mut Ancestry<'t>) {
        if self.selector.matches(node, ancestry.nodes()) {
            self.matches.push((node, ancestry.path().to_vec()));
        }
        walk_node(self, node, ancestry);
    }
}

fn collect<'t>(root: &'t Node, selector: &Selector) -> Vec<(&'t Node, NodePath)> {
    let mut collector = MatchCollector {
        selector,
        matches: Vec::new(),
    };
    collector.visit_node(root, &mut Ancestry::new());
    collector.matches
}

/// Finds every node matching `selector`, in document order.
pub fn find<'t>(root: &'t Node, selector: &Selector) -> Vec<&'t Node> {
    collect(root, selector)
        .into_iter()
        .map(|(node, _)| node)
        .collect()
}

/// Like `find`, returning child-index paths usable with `Node::at_mut`.
pub fn find_paths(root: &Node, selector: &Selector) -> Vec<NodePath> {
    collect(root, selector)
        .into_iter()
        .map(|(_, path)| path)
        .collect()
}
