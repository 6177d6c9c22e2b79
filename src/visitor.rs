use crate::tree::{Node, NodePath};

/// Ancestor chain and index path of the node being visited.
#[derive(Debug, Default)]
pub struct Ancestry<'t> {
    nodes: Vec<&'t Node>,
    path: NodePath,
}

impl<'t> Ancestry<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ancestors of the current node, outermost first.
    pub fn nodes(&self) -> &[&'t Node] {
        &self.nodes
    }

    pub fn parent(&self) -> Option<&'t Node> {
        self.nodes.last().copied()
    }

    /// Child-index path from the root to the current node.
    pub fn path(&self) -> &[usize] {
        &self.path
    }
}

/// The NodeVisitor trait is the single traversal mechanism for read-only
/// passes over a `Node` tree.
///
/// Rules:
/// 1. Traversal is depth-first pre-order, children left to right.
/// 2. Implementers override `visit_node` and call `walk_node` to continue
///    unless pruning is intended.
pub trait NodeVisitor<'t> {
    fn visit_node(&mut self, node: &'t Node, ancestry: &mut Ancestry<'t>) {
        walk_node(self, node, ancestry);
    }
}

pub fn walk_node<'t, V: NodeVisitor<'t> + ?Sized>(
    visitor: &mut V,
    node: &'t Node,
    ancestry: &mut Ancestry<'t>,
) {
    ancestry.nodes.push(node);
    for (index, child) in node.children.iter().enumerate() {
        ancestry.path.push(index);
        visitor.visit_node(child, ancestry);
        ancestry.path.pop();
    }
    ancestry.nodes.pop();
}

/// Mutable counterpart of `NodeVisitor`, without ancestry.
pub trait NodeVisitorMut {
    fn visit_node(&mut self, node: &mut Node) {
        walk_node_mut(self, node);
    }

    fn visit_children(&mut self, children: &mut Vec<Node>) {
        walk_children_mut(self, children);
    }
}

pub fn walk_node_mut<V: NodeVisitorMut + ?Sized>(visitor: &mut V, node: &mut Node) {
    visitor.visit_children(&mut node.children);
}

pub fn walk_children_mut<V: NodeVisitorMut + ?Sized>(visitor: &mut V, children: &mut Vec<Node>) {
    for node in children {
        visitor.visit_node(node);
    }
}
