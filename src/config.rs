use serde::Deserialize;

/// Options shared by every file of a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileOptions {
    /// Name of the module-import function whose calls form references.
    pub import_function: String,
    /// Extensions probed, in order, when a reference has none.
    pub resolve_extensions: Vec<String>,
    /// Indentation for rewritten metadata; `None` writes compact JSON.
    /// Line comments are always written compact.
    pub metadata_indent: Option<usize>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            import_function: "require".to_string(),
            resolve_extensions: vec![".js".to_string()],
            metadata_indent: None,
        }
    }
}

impl FileOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
