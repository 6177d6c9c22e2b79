//! Codegen module
//!
//! Serializes a `TreeModel` back to source text. Generation is
//! span-preserving: the original source is emitted verbatim except where the
//! tree differs from it (renamed identifiers, rewritten literals, rebuilt
//! regex literals, edited comments), which are spliced in at their spans.
//! The result is re-parsed before it is returned.

use lazy_static::lazy_static;
use oxc_syntax::identifier::is_identifier_name;
use regex::Regex;
use std::collections::BTreeMap;

use crate::error::GenerateFailure;
use crate::parse::check_syntax;
use crate::tree::{Comment, CommentKind, LiteralValue, Node, RegexValue, Span, TreeModel};
use crate::visitor::{walk_node, walk_node_mut, Ancestry, NodeVisitor, NodeVisitorMut};

lazy_static! {
    /// `/pattern/flags`
    static ref REGEX_LITERAL_RE: Regex = Regex::new(r"(?s)^/(.+)/([a-z]*)$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRE-GENERATION PASSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Copies the detached comment list onto the tree as its leading comments.
/// An empty list is still set.
pub fn attach_comments(tree: &mut TreeModel) {
    tree.leading_comments = Some(tree.comments.clone());
}

struct RegexRebuilder;

impl NodeVisitorMut for RegexRebuilder {
    fn visit_node(&mut self, node: &mut Node) {
        if let Some(captures) = node.raw.as_deref().and_then(|raw| REGEX_LITERAL_RE.captures(raw)) {
            node.value = Some(LiteralValue::Regex(RegexValue {
                pattern: captures[1].to_string(),
                flags: captures[2].to_string(),
            }));
        }
        walk_node_mut(self, node);
    }
}

/// Rebuilds the value of every regex literal in the tree from its `raw`.
pub fn reconstruct_regex_literals(root: &mut Node) {
    RegexRebuilder.visit_node(root);
}

// ═══════════════════════════════════════════════════════════════════════════════
// EDIT COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

struct EditCollector<'t> {
    source: &'t str,
    escaped_names: &'t BTreeMap<Span, String>,
    edits: BTreeMap<Span, String>,
    error: Option<GenerateFailure>,
}

impl<'t> EditCollector<'t> {
    fn new(source: &'t str, escaped_names: &'t BTreeMap<Span, String>) -> Self {
        Self {
            source,
            escaped_names,
            edits: BTreeMap::new(),
            error: None,
        }
    }

    fn record(&mut self, span: Span, text: String) {
        if span.slice(self.source) != text {
            self.edits.insert(span, text);
        }
    }

    fn fail(&mut self, failure: GenerateFailure) {
        self.error.get_or_insert(failure);
    }

    fn collect_comment(&mut self, comment: &Comment) {
        let unrepresentable = match comment.kind {
            CommentKind::Block => comment.value.contains("*/"),
            CommentKind::Line => comment.value.contains(['\n', '\r']),
        };
        if unrepresentable {
            self.fail(GenerateFailure::UnrepresentableComment(comment.value.clone()));
            return;
        }
        self.record(comment.span, comment.to_source());
    }
}

impl<'t> NodeVisitor<'t> for EditCollector<'_> {
    fn visit_node(&mut self, node: &'t Node, ancestry: &mut Ancestry<'t>) {
        match node.kind.as_str() {
            "Identifier" => {
                if let Some(name) = &node.name {
                    if !is_identifier_name(name) {
                        self.fail(GenerateFailure::InvalidIdentifier(name.clone()));
                    } else if self.escaped_names.get(&node.span) != Some(name) {
                        self.record(node.span, name.clone());
                    }
                }
            }
            "Literal" => {
                let text = match &node.value {
                    Some(LiteralValue::Regex(regex)) => Some(regex.to_source()),
                    _ => node.raw.clone(),
                };
                if let Some(text) = text {
                    self.record(node.span, text);
                }
            }
            _ => {}
        }
        walk_node(self, node, ancestry);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializes the tree, emitting comments and rebuilt regex literals.
pub fn generate(tree: &mut TreeModel) -> Result<String, GenerateFailure> {
    attach_comments(tree);
    reconstruct_regex_literals(&mut tree.program);

    let mut collector = EditCollector::new(&tree.source, &tree.escaped_names);
    collector.visit_node(&tree.program, &mut Ancestry::new());
    for comment in tree.leading_comments.iter().flatten() {
        collector.collect_comment(comment);
    }
    if let Some(failure) = collector.error {
        return Err(failure);
    }
    if collector.edits.is_empty() {
        return Ok(tree.source.clone());
    }

    // Apply back to front so earlier spans stay valid
    let mut result = tree.source.clone();
    for (span, replacement) in collector.edits.iter().rev() {
        result.replace_range(span.start as usize..span.end as usize, replacement);
    }

    check_syntax(&result).map_err(|messages| GenerateFailure::InvalidOutput { messages })?;
    Ok(result)
}
