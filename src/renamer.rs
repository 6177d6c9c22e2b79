use crate::selector::{find_paths, AttributeKey, Selector};
use crate::tree::TreeModel;

/// Renames every `Identifier` called `old_name` to `new_name`.
///
/// With `scope_kind`, only identifiers that have an ancestor of that kind are
/// renamed. Nodes are mutated in place; returns how many were renamed.
pub fn rename_identifier(
    tree: &mut TreeModel,
    old_name: &str,
    new_name: &str,
    scope_kind: Option<&str>,
) -> usize {
    let mut selector = Selector::kind("Identifier").with_attribute(AttributeKey::Name, old_name);
    if let Some(scope_kind) = scope_kind {
        selector = selector.within(scope_kind);
    }

    let paths = find_paths(&tree.program, &selector);
    let mut renamed = 0;
    for path in &paths {
        if let Some(node) = tree.program.at_mut(path) {
            node.name = Some(new_name.to_string());
            renamed += 1;
        }
    }
    renamed
}
