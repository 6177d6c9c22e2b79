//! JavaScript file facade.
//!
//! Ties parsing, reference tracking, rewriting and generation to a storage
//! collaborator. A `JavaScriptFile` exclusively owns its `TreeModel`; the
//! reference graph only ever sees its path.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codegen::generate;
use crate::config::FileOptions;
use crate::error::{FailureCause, FileError, Operation};
use crate::metadata::{read_metadata, update_metadata, Metadata};
use crate::parse::parse;
use crate::references::{extract_references, rewrite_import_paths, ReferenceManager};
use crate::renamer::rename_identifier;
use crate::selector::{find, Selector};
use crate::storage::Storage;
use crate::tree::{Node, TreeModel};

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage-backed lifecycle shared by file types.
#[allow(async_fn_in_trait)]
pub trait FileLifecycle {
    type Content;
    type Input;

    fn path(&self) -> &Path;

    /// Reads and parses the file, refreshing its outgoing references.
    async fn load<R: ReferenceManager>(
        &mut self,
        references: &mut R,
    ) -> Result<&Self::Content, FileError>;

    async fn save(&mut self, input: Self::Input) -> Result<(), FileError>;

    fn serialise(&mut self) -> Result<String, FileError>;

    fn to_json(&self) -> Value;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Unloaded,
    Loaded,
}

pub enum SaveInput {
    Tree(TreeModel),
    Text(String),
}

impl From<TreeModel> for SaveInput {
    fn from(tree: TreeModel) -> Self {
        SaveInput::Tree(tree)
    }
}

impl From<String> for SaveInput {
    fn from(text: String) -> Self {
        SaveInput::Text(text)
    }
}

impl From<&str> for SaveInput {
    fn from(text: &str) -> Self {
        SaveInput::Text(text.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFACTOR ACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifierChange {
    old_name: String,
    new_name: String,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataChange {
    old_name: String,
    new_name: String,
    #[serde(default, rename = "type")]
    collection: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferencePathChange {
    old_path: String,
    new_path: String,
}

/// Applies one refactor to a tree, returning how many places changed.
pub type RefactorHandler =
    fn(&mut TreeModel, &Value, &FileOptions) -> Result<usize, serde_json::Error>;

fn identifier_change(
    tree: &mut TreeModel,
    data: &Value,
    _options: &FileOptions,
) -> Result<usize, serde_json::Error> {
    let change = IdentifierChange::deserialize(data)?;
    Ok(rename_identifier(
        tree,
        &change.old_name,
        &change.new_name,
        change.context.as_deref(),
    ))
}

fn metadata_change(
    tree: &mut TreeModel,
    data: &Value,
    options: &FileOptions,
) -> Result<usize, serde_json::Error> {
    let change = MetadataChange::deserialize(data)?;
    let changed = update_metadata(
        tree,
        &change.old_name,
        &change.new_name,
        change.collection.as_deref(),
        options.metadata_indent,
    );
    Ok(usize::from(changed))
}

fn reference_path_change(
    tree: &mut TreeModel,
    data: &Value,
    options: &FileOptions,
) -> Result<usize, serde_json::Error> {
    let change = ReferencePathChange::deserialize(data)?;
    Ok(rewrite_import_paths(
        tree,
        &options.import_function,
        &change.old_path,
        &change.new_path,
    ))
}

fn no_change(
    _tree: &mut TreeModel,
    _data: &Value,
    _options: &FileOptions,
) -> Result<usize, serde_json::Error> {
    Ok(0)
}

lazy_static! {
    static ref REFACTOR_ACTIONS: HashMap<&'static str, RefactorHandler> = {
        let mut m: HashMap<&'static str, RefactorHandler> = HashMap::new();
        m.insert("identifierChange", identifier_change);
        m.insert("metadataChange", metadata_change);
        m.insert("referencePathChange", reference_path_change);
        m
    };
}

/// Looks up a refactor action; unknown names get a handler that changes
/// nothing.
pub fn refactor_handler(action: &str) -> RefactorHandler {
    REFACTOR_ACTIONS.get(action).copied().unwrap_or(no_change)
}

// ═══════════════════════════════════════════════════════════════════════════════
// JAVASCRIPT FILE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct FileJson<'f> {
    pub ast: &'f TreeModel,
    pub meta: Option<Metadata>,
}

pub struct JavaScriptFile<S> {
    path: PathBuf,
    storage: Arc<S>,
    options: FileOptions,
    tree: TreeModel,
    state: FileState,
}

impl<S: Storage> JavaScriptFile<S> {
    pub fn new(path: impl Into<PathBuf>, storage: Arc<S>, options: FileOptions) -> Self {
        Self {
            path: path.into(),
            storage,
            options,
            tree: TreeModel::empty(),
            state: FileState::Unloaded,
        }
    }

    pub fn tree(&self) -> &TreeModel {
        &self.tree
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn options(&self) -> &FileOptions {
        &self.options
    }

    /// Metadata from the first comment, if it is a JSON object.
    pub fn meta(&self) -> Option<Metadata> {
        read_metadata(&self.tree)
    }

    pub fn query(&self, selector: &Selector) -> Vec<&Node> {
        find(&self.tree.program, selector)
    }

    pub fn json(&self) -> FileJson<'_> {
        FileJson {
            ast: &self.tree,
            meta: self.meta(),
        }
    }

    /// Runs the named refactor action, then saves. Unknown actions change
    /// nothing but still save. The in-memory tree only changes once the
    /// write succeeds; a file that was never loaded is refactored from its
    /// stored text.
    pub async fn refactor(&mut self, action: &str, data: &Value) -> Result<(), FileError> {
        let mut tree = match self.state {
            FileState::Loaded => self.tree.clone(),
            FileState::Unloaded => self.read_tree().await?,
        };

        let handler = refactor_handler(action);
        let changed = handler(&mut tree, data, &self.options)
            .map_err(|e| self.fail(Operation::Refactoring, e))?;
        tracing::debug!(
            "Refactor '{}' changed {} node(s) in {}",
            action,
            changed,
            self.path.display()
        );

        let text = generate(&mut tree).map_err(|e| self.fail(Operation::Saving, e))?;
        self.write_text(&text).await?;
        self.tree = tree;
        Ok(())
    }

    fn fail(&self, operation: Operation, cause: impl Into<FailureCause>) -> FileError {
        let err = FileError::new(operation, &self.path, cause);
        tracing::warn!("{} ({})", err, err.cause);
        err
    }

    fn update_references<R: ReferenceManager>(&self, references: &mut R) {
        // Nothing was recorded before the first load
        if self.state == FileState::Loaded {
            references.clear_references(&self.path);
        }
        let targets = extract_references(
            &self.tree,
            &self.path,
            references,
            &self.options.import_function,
        );
        for target in &targets {
            references.add_reference(&self.path, target);
        }
    }

    async fn read_tree(&self) -> Result<TreeModel, FileError> {
        let text = self
            .storage
            .read(&self.path)
            .await
            .map_err(|e| self.fail(Operation::Parsing, e))?;
        parse(&text).map_err(|e| self.fail(Operation::Parsing, e))
    }

    async fn write_text(&self, text: &str) -> Result<(), FileError> {
        self.storage
            .write(&self.path, text)
            .await
            .map_err(|e| self.fail(Operation::Saving, e))?;
        tracing::debug!("Saved {}", self.path.display());
        Ok(())
    }
}

impl<S: Storage> FileLifecycle for JavaScriptFile<S> {
    type Content = TreeModel;
    type Input = SaveInput;

    fn path(&self) -> &Path {
        &self.path
    }

    async fn load<R: ReferenceManager>(
        &mut self,
        references: &mut R,
    ) -> Result<&TreeModel, FileError> {
        self.tree = self.read_tree().await?;
        self.update_references(references);
        self.state = FileState::Loaded;
        tracing::debug!("Loaded {}", self.path.display());
        Ok(&self.tree)
    }

    async fn save(&mut self, input: SaveInput) -> Result<(), FileError> {
        let mut tree = match input {
            SaveInput::Tree(tree) => tree,
            SaveInput::Text(text) => {
                parse(&text).map_err(|e| self.fail(Operation::Saving, e))?
            }
        };
        let text = generate(&mut tree).map_err(|e| self.fail(Operation::Saving, e))?;
        self.write_text(&text).await?;
        self.tree = tree;
        Ok(())
    }

    fn serialise(&mut self) -> Result<String, FileError> {
        generate(&mut self.tree).map_err(|e| self.fail(Operation::Saving, e))
    }

    fn to_json(&self) -> Value {
        serde_json::to_value(self.json()).unwrap_or(Value::Null)
    }
}
