//! Reference graph between files.
//!
//! A file references another when its tree contains a module-import call
//! (`require('./other')` by default) whose single string argument resolves
//! to a known file. Edges are stored on both sides and always kept mirrored.

use lazy_static::lazy_static;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use crate::config::FileOptions;
use crate::selector::{find_paths, Selector};
use crate::tree::{LiteralValue, Node, NodePath, TreeModel};

lazy_static! {
    /// Calls whose result initializes a variable, property or assignment.
    static ref IMPORT_CALL_SELECTOR: Selector = Selector::parse(
        "VariableDeclarator > CallExpression, Property > CallExpression, AssignmentExpression > CallExpression"
    )
    .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ReferenceManager {
    /// Resolves `specifier`, relative to the file at `from`, to a known file.
    fn resolve(&self, from: &Path, specifier: &str) -> Option<PathBuf>;

    /// Removes every outgoing edge of `file` and its mirror.
    fn clear_references(&mut self, file: &Path);

    fn add_reference(&mut self, from: &Path, to: &Path);
}

/// Lexically normalizes `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// In-memory reference graph over a set of registered files.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    files: BTreeSet<PathBuf>,
    extensions: Vec<String>,
    references: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    referenced_by: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl ReferenceGraph {
    pub fn new(options: &FileOptions) -> Self {
        Self {
            extensions: options.resolve_extensions.clone(),
            ..Self::default()
        }
    }

    pub fn register(&mut self, path: impl AsRef<Path>) {
        self.files.insert(normalize_path(path.as_ref()));
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    /// Unregisters a file and drops its edges on both sides.
    pub fn remove(&mut self, path: &Path) {
        self.clear_references(path);
        if let Some(referrers) = self.referenced_by.remove(path) {
            for referrer in referrers {
                remove_edge(&mut self.references, &referrer, path);
            }
        }
        self.files.remove(path);
    }

    pub fn references(&self, path: &Path) -> Vec<&Path> {
        edges(&self.references, path)
    }

    pub fn referenced_by(&self, path: &Path) -> Vec<&Path> {
        edges(&self.referenced_by, path)
    }
}

fn edges<'g>(map: &'g BTreeMap<PathBuf, BTreeSet<PathBuf>>, path: &Path) -> Vec<&'g Path> {
    map.get(path)
        .map(|set| set.iter().map(PathBuf::as_path).collect())
        .unwrap_or_default()
}

fn remove_edge(map: &mut BTreeMap<PathBuf, BTreeSet<PathBuf>>, from: &Path, to: &Path) {
    if let Some(set) = map.get_mut(from) {
        set.remove(to);
        if set.is_empty() {
            map.remove(from);
        }
    }
}

impl ReferenceManager for ReferenceGraph {
    fn resolve(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
        let base = from.parent().unwrap_or_else(|| Path::new(""));
        let candidate = normalize_path(&base.join(specifier));
        if self.files.contains(&candidate) {
            return Some(candidate);
        }
        self.extensions
            .iter()
            .map(|extension| {
                let mut with_extension = candidate.clone().into_os_string();
                with_extension.push(extension);
                PathBuf::from(with_extension)
            })
            .find(|path| self.files.contains(path))
    }

    fn clear_references(&mut self, file: &Path) {
        if let Some(targets) = self.references.remove(file) {
            for target in targets {
                remove_edge(&mut self.referenced_by, &target, file);
            }
        }
    }

    fn add_reference(&mut self, from: &Path, to: &Path) {
        self.references
            .entry(from.to_path_buf())
            .or_default()
            .insert(to.to_path_buf());
        self.referenced_by
            .entry(to.to_path_buf())
            .or_default()
            .insert(from.to_path_buf());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORT EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A module-import call with a single string argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCall {
    pub specifier: String,
    /// Path of the string literal argument.
    pub argument: NodePath,
}

fn as_import_call(call: &Node, import_function: &str) -> Option<String> {
    let (callee, arguments) = call.children.split_first()?;
    if !callee.is_kind("Identifier") || callee.name.as_deref() != Some(import_function) {
        return None;
    }
    match arguments {
        [argument] if argument.is_string_literal() => {
            argument.value.as_ref().and_then(LiteralValue::as_str).map(str::to_string)
        }
        _ => None,
    }
}

pub fn find_import_calls(tree: &TreeModel, import_function: &str) -> Vec<ImportCall> {
    find_paths(&tree.program, &IMPORT_CALL_SELECTOR)
        .into_iter()
        .filter_map(|path| {
            let call = tree.program.at(&path)?;
            let specifier = as_import_call(call, import_function)?;
            let mut argument = path;
            argument.push(1);
            Some(ImportCall {
                specifier,
                argument,
            })
        })
        .collect()
}

/// Resolves every import call of the tree. Unresolvable targets are skipped.
pub fn extract_references<R: ReferenceManager + ?Sized>(
    tree: &TreeModel,
    from: &Path,
    manager: &R,
    import_function: &str,
) -> BTreeSet<PathBuf> {
    let mut targets = BTreeSet::new();
    for call in find_import_calls(tree, import_function) {
        match manager.resolve(from, &call.specifier) {
            Some(target) => {
                targets.insert(target);
            }
            None => tracing::debug!(
                "Skipping unresolved reference '{}' in {}",
                call.specifier,
                from.display()
            ),
        }
    }
    targets
}

/// Points every import call of `old_path` at `new_path` instead.
pub fn rewrite_import_paths(
    tree: &mut TreeModel,
    import_function: &str,
    old_path: &str,
    new_path: &str,
) -> usize {
    let mut rewritten = 0;
    for call in find_import_calls(tree, import_function) {
        if call.specifier != old_path {
            continue;
        }
        if let Some(argument) = tree.program.at_mut(&call.argument) {
            argument.set_string_value(new_path);
            rewritten += 1;
        }
    }
    rewritten
}
