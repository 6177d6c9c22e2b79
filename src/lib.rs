//! # JavaScript File Engine
//!
//! Parse → query/mutate → reference-track → serialize pipeline for
//! JavaScript source files.
//!
//! ## Pipeline
//!
//! 1. **Parse**: source text is parsed with oxc (script semantics) and lowered
//!    into an owned `TreeModel` with ESTree node kinds. Comments are detached
//!    into the tree's comment list.
//! 2. **Query**: `Selector`s find nodes by kind, attributes and ancestor chain.
//! 3. **Mutate**: identifiers are renamed (optionally scoped to an enclosing
//!    kind), the JSON metadata in the first comment is rewritten, import
//!    paths are repointed.
//! 4. **Track**: module-import calls are resolved into a mirrored
//!    `references`/`referenced_by` graph on every load.
//! 5. **Generate**: the tree is written back to text, preserving comments and
//!    regular-expression literals byte for byte.
//!
//! ## Ownership
//!
//! A `JavaScriptFile` exclusively owns its `TreeModel` and mutates it in
//! place. The reference graph holds paths, never trees.

mod codegen;
mod config;
mod error;
mod file;
mod metadata;
mod parse;
mod references;
mod renamer;
mod selector;
mod storage;
mod tree;
mod visitor;

#[cfg(test)]
mod file_tests;

pub use codegen::{attach_comments, generate, reconstruct_regex_literals};
pub use config::FileOptions;
pub use error::{
    ErrorEnvelope, FailureCause, FileError, GenerateFailure, Operation, ParseFailure,
    CLIENT_ERROR_STATUS,
};
pub use file::{
    refactor_handler, FileJson, FileLifecycle, FileState, JavaScriptFile, RefactorHandler,
    SaveInput,
};
pub use metadata::{read_metadata, update_metadata, Metadata};
pub use parse::{parse, script_source_type};
pub use references::{
    extract_references, find_import_calls, normalize_path, rewrite_import_paths, ImportCall,
    ReferenceGraph, ReferenceManager,
};
pub use renamer::rename_identifier;
pub use selector::{
    find, find_paths, AttributeFilter, AttributeKey, Combinator, Complex, Compound, Selector,
    SelectorError,
};
pub use storage::{FsStorage, MemoryStorage, Storage};
pub use tree::{Comment, CommentKind, LiteralValue, Node, NodePath, RegexValue, Span, TreeModel};
pub use visitor::{walk_node, walk_node_mut, Ancestry, NodeVisitor, NodeVisitorMut};
