//! Metadata comment handling.
//!
//! The first comment of a file carries its metadata as a JSON object:
//!
//! ```text
//! /*{"name":"Login page","elements":[{"name":"submit button"}]}*/
//! ```
//!
//! Invalid JSON is never an error: reads yield `None`, updates do nothing.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::tree::{CommentKind, TreeModel};

pub type Metadata = Map<String, Value>;

/// Parses the first comment as a JSON object.
pub fn read_metadata(tree: &TreeModel) -> Option<Metadata> {
    let comment = tree.first_comment()?;
    match serde_json::from_str::<Value>(&comment.value) {
        Ok(Value::Object(meta)) => Some(meta),
        _ => None,
    }
}

fn rename_entry(entry: &mut Metadata, old_name: &str, new_name: &str) -> bool {
    match entry.get_mut("name") {
        Some(name) if name.as_str() == Some(old_name) => {
            *name = Value::String(new_name.to_string());
            true
        }
        _ => false,
    }
}

fn to_json(meta: &Metadata, indent: Option<usize>) -> Option<String> {
    match indent {
        None => serde_json::to_string(meta).ok(),
        Some(width) => {
            let indent = vec![b' '; width];
            let mut buffer = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(
                &mut buffer,
                PrettyFormatter::with_indent(&indent),
            );
            meta.serialize(&mut serializer).ok()?;
            String::from_utf8(buffer).ok()
        }
    }
}

/// Renames `old_name` to `new_name` in the metadata comment.
///
/// Without `collection_key` the top-level `name` is updated; with it, every
/// object in that array whose `name` matches. The comment text is replaced in
/// place, keeping the whitespace around the JSON. Returns whether anything
/// changed.
pub fn update_metadata(
    tree: &mut TreeModel,
    old_name: &str,
    new_name: &str,
    collection_key: Option<&str>,
    indent: Option<usize>,
) -> bool {
    let Some(mut meta) = read_metadata(tree) else {
        tracing::debug!("No metadata comment to update");
        return false;
    };

    let changed = match collection_key {
        None => rename_entry(&mut meta, old_name, new_name),
        Some(key) => match meta.get_mut(key) {
            Some(Value::Array(items)) => items
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .fold(false, |changed, item| {
                    rename_entry(item, old_name, new_name) || changed
                }),
            _ => false,
        },
    };
    if !changed {
        return false;
    }

    let Some(comment) = tree.comments.first_mut() else {
        return false;
    };
    // Line comments cannot hold line breaks
    let indent = match comment.kind {
        CommentKind::Line => None,
        CommentKind::Block => indent,
    };
    let Some(json) = to_json(&meta, indent) else {
        return false;
    };

    let value = &comment.value;
    let leading = &value[..value.len() - value.trim_start().len()];
    let trailing = &value[value.trim_end().len()..];
    comment.value = format!("{}{}{}", leading, json, trailing);
    true
}
