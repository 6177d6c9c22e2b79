//! Parse Module
//!
//! Parses JavaScript source with oxc and lowers the arena AST into an owned
//! `TreeModel`. Node kinds follow ESTree naming so selectors read the same
//! way they would against any ESTree tool.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{ClassType, FunctionType, Program};
use oxc_ast::AstKind;
use oxc_ast_visit::Visit;
use oxc_parser::{ParseOptions, Parser};
use oxc_span::{GetSpan, SourceType};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::ParseFailure;
use crate::tree::{Comment, CommentKind, LiteralValue, Node, Span, TreeModel};

// ═══════════════════════════════════════════════════════════════════════════════
// KIND MAPPING
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// oxc kinds renamed to their ESTree counterpart.
    static ref KIND_ALIASES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("IdentifierReference", "Identifier");
        m.insert("BindingIdentifier", "Identifier");
        m.insert("IdentifierName", "Identifier");
        m.insert("LabelIdentifier", "Identifier");
        m.insert("StringLiteral", "Literal");
        m.insert("NumericLiteral", "Literal");
        m.insert("BooleanLiteral", "Literal");
        m.insert("NullLiteral", "Literal");
        m.insert("RegExpLiteral", "Literal");
        m.insert("BigIntLiteral", "Literal");
        m.insert("StaticMemberExpression", "MemberExpression");
        m.insert("ComputedMemberExpression", "MemberExpression");
        m.insert("PrivateFieldExpression", "MemberExpression");
        m.insert("ObjectProperty", "Property");
        m.insert("FunctionBody", "BlockStatement");
        m.insert("BindingRestElement", "RestElement");
        m.insert("FormalParameterRest", "RestElement");
        m.insert("BindingProperty", "Property");
        m
    };

    /// Wrapper kinds with no ESTree node of their own; their children attach
    /// to the enclosing node.
    static ref TRANSPARENT_KINDS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Argument");
        s.insert("ArrayExpressionElement");
        s.insert("Expression");
        s.insert("Statement");
        s.insert("Declaration");
        s.insert("PropertyKey");
        s.insert("BindingPattern");
        s.insert("AssignmentTarget");
        s.insert("SimpleAssignmentTarget");
        s.insert("AssignmentTargetPattern");
        s.insert("MemberExpression");
        s.insert("ForStatementInit");
        s.insert("ForStatementLeft");
        s.insert("ParenthesizedExpression");
        s.insert("FormalParameters");
        s.insert("FormalParameter");
        s
    };
}

fn oxc_kind_name(kind: &AstKind) -> String {
    let debug_name = kind.debug_name();
    debug_name
        .split('(')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn estree_kind(kind: &AstKind, oxc_name: &str) -> String {
    match kind {
        AstKind::Function(func) => {
            if matches!(func.r#type, FunctionType::FunctionDeclaration) {
                "FunctionDeclaration".to_string()
            } else {
                "FunctionExpression".to_string()
            }
        }
        AstKind::Class(class) => {
            if matches!(class.r#type, ClassType::ClassDeclaration) {
                "ClassDeclaration".to_string()
            } else {
                "ClassExpression".to_string()
            }
        }
        _ => KIND_ALIASES
            .get(oxc_name)
            .copied()
            .unwrap_or(oxc_name)
            .to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

struct Lowerer<'s> {
    source: &'s str,
    stack: Vec<Node>,
    root: Option<Node>,
    /// Identifiers whose name differs from their source text (escapes).
    escaped_names: BTreeMap<Span, String>,
}

impl<'s> Lowerer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            stack: Vec::new(),
            root: None,
            escaped_names: BTreeMap::new(),
        }
    }

    fn lower(&mut self, kind: &AstKind, oxc_name: &str) -> Node {
        let span = Span::from(kind.span());
        let mut node = Node::new(estree_kind(kind, oxc_name), span);
        let raw = || Some(span.slice(self.source).to_string());

        match kind {
            AstKind::IdentifierReference(id) => node.name = Some(id.name.to_string()),
            AstKind::BindingIdentifier(id) => node.name = Some(id.name.to_string()),
            AstKind::IdentifierName(id) => node.name = Some(id.name.to_string()),
            AstKind::LabelIdentifier(id) => node.name = Some(id.name.to_string()),
            AstKind::StringLiteral(lit) => {
                node.value = Some(LiteralValue::String(lit.value.to_string()));
                node.raw = raw();
            }
            AstKind::NumericLiteral(lit) => {
                node.value = Some(LiteralValue::Number(lit.value));
                node.raw = raw();
            }
            AstKind::BooleanLiteral(lit) => {
                node.value = Some(LiteralValue::Boolean(lit.value));
                node.raw = raw();
            }
            AstKind::NullLiteral(_) => {
                node.value = Some(LiteralValue::Null);
                node.raw = raw();
            }
            // Regex values are rebuilt from `raw` by the generator.
            AstKind::RegExpLiteral(_) | AstKind::BigIntLiteral(_) => node.raw = raw(),
            _ => {}
        }

        if let Some(name) = &node.name {
            if span.slice(self.source) != name.as_str() {
                self.escaped_names.insert(span, name.clone());
            }
        }
        node
    }

    fn finish(self) -> (Node, BTreeMap<Span, String>) {
        let root = self
            .root
            .unwrap_or_else(|| Node::new("Program", Span::new(0, self.source.len() as u32)));
        (root, self.escaped_names)
    }
}

impl<'a> Visit<'a> for Lowerer<'_> {
    fn enter_node(&mut self, kind: AstKind<'a>) {
        let oxc_name = oxc_kind_name(&kind);
        if TRANSPARENT_KINDS.contains(oxc_name.as_str()) {
            return;
        }
        let node = self.lower(&kind, &oxc_name);
        self.stack.push(node);
    }

    fn leave_node(&mut self, kind: AstKind<'a>) {
        if TRANSPARENT_KINDS.contains(oxc_kind_name(&kind).as_str()) {
            return;
        }
        if let Some(node) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => self.root = Some(node),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds a `Comment` from a comment span, accepting spans with or without
/// their delimiters.
pub(crate) fn lower_comment(source: &str, span: Span) -> Option<Comment> {
    let text = span.slice(source);
    if text.starts_with("/*") && text.ends_with("*/") && text.len() >= 4 {
        return Some(Comment {
            kind: CommentKind::Block,
            value: text[2..text.len() - 2].to_string(),
            span,
        });
    }
    if let Some(value) = text.strip_prefix("//") {
        return Some(Comment {
            kind: CommentKind::Line,
            value: value.to_string(),
            span,
        });
    }

    let start = span.start.checked_sub(2)?;
    let opener = Span::new(start, span.start).slice(source);
    match opener {
        "/*" => Some(Comment {
            kind: CommentKind::Block,
            value: text.to_string(),
            span: Span::new(start, span.end + 2),
        }),
        "//" => Some(Comment {
            kind: CommentKind::Line,
            value: text.to_string(),
            span: Span::new(start, span.end),
        }),
        _ => None,
    }
}

fn collect_comments(source: &str, program: &Program) -> Vec<Comment> {
    program
        .comments
        .iter()
        .filter_map(|comment| lower_comment(source, Span::from(comment.span)))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// Source type used for every file: plain JavaScript, script semantics.
pub fn script_source_type() -> SourceType {
    SourceType::default().with_module(false)
}

/// Parenthesized expressions are dropped, as in ESTree.
fn parse_options() -> ParseOptions {
    ParseOptions {
        preserve_parens: false,
        ..ParseOptions::default()
    }
}

/// Checks that `text` parses, returning the parser diagnostics otherwise.
pub(crate) fn check_syntax(text: &str) -> Result<(), Vec<String>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, text, script_source_type())
        .with_options(parse_options())
        .parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(diagnostic_messages(&ret.errors, ret.panicked));
    }
    Ok(())
}

fn diagnostic_messages<E: ToString>(errors: &[E], panicked: bool) -> Vec<String> {
    let mut messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    if panicked && messages.is_empty() {
        messages.push("Parser aborted".to_string());
    }
    messages
}

/// Parses source text into a `TreeModel`, keeping comments.
pub fn parse(text: &str) -> Result<TreeModel, ParseFailure> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, text, script_source_type())
        .with_options(parse_options())
        .parse();

    if ret.panicked || !ret.errors.is_empty() {
        return Err(ParseFailure::Syntax {
            messages: diagnostic_messages(&ret.errors, ret.panicked),
        });
    }

    let comments = collect_comments(text, &ret.program);
    let mut lowerer = Lowerer::new(text);
    lowerer.visit_program(&ret.program);
    let (program, escaped_names) = lowerer.finish();

    let mut tree = TreeModel::new(text.to_string(), program, comments);
    tree.escaped_names = escaped_names;
    Ok(tree)
}
