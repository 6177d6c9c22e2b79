#[cfg(test)]
mod tests {
    use crate::config::FileOptions;
    use crate::error::Operation;
    use crate::file::{FileLifecycle, FileState, JavaScriptFile, SaveInput};
    use crate::references::{ReferenceGraph, ReferenceManager};
    use crate::storage::{MemoryStorage, Storage};
    use serde_json::json;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    // ═══════════════════════════════════════════════════════════════════════════
    // TEST COLLABORATORS
    // ═══════════════════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct TestStorage {
        inner: MemoryStorage,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    impl TestStorage {
        fn with_file(path: &str, text: &str) -> Arc<Self> {
            let storage = Self::default();
            storage.inner.insert(path, text);
            Arc::new(storage)
        }

        fn text(&self, path: &str) -> String {
            self.inner.get(Path::new(path)).unwrap_or_default()
        }
    }

    impl Storage for TestStorage {
        async fn read(&self, path: &Path) -> io::Result<String> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "read failed"));
            }
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, text: &str) -> io::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "write failed"));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(path, text).await
        }
    }

    /// Counts clear calls on top of a real graph.
    struct RecordingManager {
        graph: ReferenceGraph,
        clears: Vec<PathBuf>,
    }

    impl RecordingManager {
        fn new(files: &[&str]) -> Self {
            let mut graph = ReferenceGraph::new(&FileOptions::default());
            for file in files {
                graph.register(file);
            }
            Self {
                graph,
                clears: Vec::new(),
            }
        }
    }

    impl ReferenceManager for RecordingManager {
        fn resolve(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
            self.graph.resolve(from, specifier)
        }

        fn clear_references(&mut self, file: &Path) {
            self.clears.push(file.to_path_buf());
            self.graph.clear_references(file);
        }

        fn add_reference(&mut self, from: &Path, to: &Path) {
            self.graph.add_reference(from, to);
        }
    }

    fn file(path: &str, storage: &Arc<TestStorage>) -> JavaScriptFile<TestStorage> {
        JavaScriptFile::new(path, Arc::clone(storage), FileOptions::default())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOAD & REFERENCES
    // ═══════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_first_load_skips_clear() {
        let storage = TestStorage::with_file("/p/a.js", "var b = require('./b');");
        storage.inner.insert("/p/b.js", "var x;");
        let mut manager = RecordingManager::new(&["/p/a.js", "/p/b.js"]);
        let mut a = file("/p/a.js", &storage);

        assert_eq!(a.state(), FileState::Unloaded);
        a.load(&mut manager).await.unwrap();
        assert_eq!(a.state(), FileState::Loaded);
        assert!(manager.clears.is_empty());

        a.load(&mut manager).await.unwrap();
        assert_eq!(manager.clears, vec![PathBuf::from("/p/a.js")]);

        a.load(&mut manager).await.unwrap();
        assert_eq!(manager.clears.len(), 2);
    }

    #[tokio::test]
    async fn test_reference_symmetry_across_reloads() {
        let storage = TestStorage::with_file(
            "/p/a.js",
            "var b = require('./b'); var c = { mod: require('./lib/c.js') };",
        );
        let mut manager = RecordingManager::new(&["/p/a.js", "/p/b.js", "/p/lib/c.js"]);
        let mut a = file("/p/a.js", &storage);
        let (pa, pb, pc) = (
            Path::new("/p/a.js"),
            Path::new("/p/b.js"),
            Path::new("/p/lib/c.js"),
        );

        a.load(&mut manager).await.unwrap();
        assert_eq!(manager.graph.references(pa), vec![pb, pc]);
        assert_eq!(manager.graph.referenced_by(pb), vec![pa]);
        assert_eq!(manager.graph.referenced_by(pc), vec![pa]);

        storage.inner.insert("/p/a.js", "var c = require('./lib/c');");
        a.load(&mut manager).await.unwrap();
        assert_eq!(manager.graph.references(pa), vec![pc]);
        assert!(manager.graph.referenced_by(pb).is_empty());
        assert_eq!(manager.graph.referenced_by(pc), vec![pa]);
    }

    #[tokio::test]
    async fn test_missing_reference_does_not_fail_load() {
        let storage = TestStorage::with_file("/p/a.js", "var gone = require('./gone');");
        let mut manager = RecordingManager::new(&["/p/a.js"]);
        let mut a = file("/p/a.js", &storage);

        let tree = a.load(&mut manager).await.unwrap();
        assert_eq!(tree.program.children.len(), 1);
        assert!(manager.graph.references(Path::new("/p/a.js")).is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_envelope() {
        let storage = TestStorage::with_file("/p/a.js", "var a;");
        storage.fail_reads.store(true, Ordering::SeqCst);
        let mut a = file("/p/a.js", &storage);

        let err = a.load(&mut ReferenceGraph::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Parsing \"/p/a.js\" failed.");
        assert_eq!(err.status, 400);
        assert_eq!(err.operation, Operation::Parsing);
        assert_eq!(err.envelope().kind, "StorageFailure");
        assert_eq!(a.state(), FileState::Unloaded);
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_previous_tree() {
        let storage = TestStorage::with_file("/p/a.js", "var a;");
        let mut a = file("/p/a.js", &storage);
        let mut graph = ReferenceGraph::default();
        a.load(&mut graph).await.unwrap();

        storage.inner.insert("/p/a.js", "var = ;");
        let err = a.load(&mut graph).await.unwrap_err();
        assert_eq!(err.message, "Parsing \"/p/a.js\" failed.");
        assert_eq!(err.envelope().kind, "ParseFailure");
        assert_eq!(a.tree().source(), "var a;");
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SAVE
    // ═══════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_save_text_round_trips_through_tree() {
        let storage = Arc::new(TestStorage::default());
        let mut a = file("/p/a.js", &storage);

        a.save("/*{\"name\":\"a\"}*/ var a = /x/g;".into()).await.unwrap();
        assert_eq!(storage.text("/p/a.js"), "/*{\"name\":\"a\"}*/ var a = /x/g;");
        assert_eq!(a.tree().comments.len(), 1);
        assert_eq!(a.meta().unwrap()["name"], json!("a"));
    }

    #[tokio::test]
    async fn test_save_tree() {
        let storage = Arc::new(TestStorage::default());
        let mut a = file("/p/a.js", &storage);
        let tree = crate::parse::parse("var saved = true;").unwrap();

        a.save(SaveInput::Tree(tree)).await.unwrap();
        assert_eq!(storage.text("/p/a.js"), "var saved = true;");
    }

    #[tokio::test]
    async fn test_invalid_text_is_not_saved() {
        let storage = Arc::new(TestStorage::default());
        let mut a = file("/p/a.js", &storage);

        let err = a.save("function (".into()).await.unwrap_err();
        assert_eq!(err.to_string(), "Saving \"/p/a.js\" failed.");
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_failure_envelope() {
        let storage = Arc::new(TestStorage::default());
        storage.fail_writes.store(true, Ordering::SeqCst);
        let mut a = file("/p/a.js", &storage);

        let err = a.save("var a;".into()).await.unwrap_err();
        assert_eq!(err.to_string(), "Saving \"/p/a.js\" failed.");
        assert_eq!(err.status, 400);
        assert_eq!(err.envelope().kind, "StorageFailure");
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REFACTOR
    // ═══════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_identifier_change_is_persisted() {
        let storage = TestStorage::with_file("/p/a.js", "var oldName; function oldName () {}");
        let mut a = file("/p/a.js", &storage);
        a.load(&mut ReferenceGraph::default()).await.unwrap();

        a.refactor(
            "identifierChange",
            &json!({ "oldName": "oldName", "newName": "newName", "context": "FunctionDeclaration" }),
        )
        .await
        .unwrap();
        assert_eq!(storage.text("/p/a.js"), "var oldName; function newName () {}");
    }

    #[tokio::test]
    async fn test_metadata_change_is_persisted() {
        let storage = TestStorage::with_file(
            "/p/a.js",
            "/*{\"page-objects\":[{\"name\":\"old name\"}]}*/\nvar po = require('./po');",
        );
        let mut a = file("/p/a.js", &storage);
        a.load(&mut ReferenceGraph::default()).await.unwrap();

        a.refactor(
            "metadataChange",
            &json!({ "oldName": "old name", "newName": "new name", "type": "page-objects" }),
        )
        .await
        .unwrap();
        assert_eq!(
            storage.text("/p/a.js"),
            "/*{\"page-objects\":[{\"name\":\"new name\"}]}*/\nvar po = require('./po');"
        );
        assert_eq!(
            a.to_json()["meta"],
            json!({ "page-objects": [{ "name": "new name" }] })
        );
    }

    #[tokio::test]
    async fn test_reference_path_change() {
        let storage = TestStorage::with_file("/p/a.js", "var b = require('./b.js');");
        let mut a = file("/p/a.js", &storage);
        a.load(&mut ReferenceGraph::default()).await.unwrap();

        a.refactor(
            "referencePathChange",
            &json!({ "oldPath": "./b.js", "newPath": "./moved/b.js" }),
        )
        .await
        .unwrap();
        assert_eq!(storage.text("/p/a.js"), "var b = require('./moved/b.js');");
    }

    #[tokio::test]
    async fn test_unknown_action_still_saves() {
        let storage = TestStorage::with_file("/p/a.js", "// note\nvar a = 1;");
        let mut a = file("/p/a.js", &storage);
        a.load(&mut ReferenceGraph::default()).await.unwrap();
        let before = a.tree().clone();

        a.refactor("notAnAction", &json!({})).await.unwrap();
        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
        assert_eq!(storage.text("/p/a.js"), "// note\nvar a = 1;");
        assert!(a.tree().structurally_eq(&before));
        assert_eq!(a.tree().comments, before.comments);
    }

    #[tokio::test]
    async fn test_malformed_refactor_data() {
        let storage = TestStorage::with_file("/p/a.js", "var a;");
        let mut a = file("/p/a.js", &storage);
        a.load(&mut ReferenceGraph::default()).await.unwrap();

        let err = a
            .refactor("identifierChange", &json!({ "oldName": "a" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Refactoring \"/p/a.js\" failed.");
        assert_eq!(err.status, 400);
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_refactor_leaves_tree_untouched() {
        let storage = TestStorage::with_file("/p/a.js", "var a = 1;");
        let mut a = file("/p/a.js", &storage);
        a.load(&mut ReferenceGraph::default()).await.unwrap();

        let err = a
            .refactor("identifierChange", &json!({ "oldName": "a", "newName": "1bad" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Saving \"/p/a.js\" failed.");
        assert_eq!(err.envelope().kind, "GenerateFailure");
        assert_eq!(storage.text("/p/a.js"), "var a = 1;");
        let name = &a.tree().program.children[0].children[0].children[0].name;
        assert_eq!(name.as_deref(), Some("a"));

        a.refactor("notAnAction", &json!({})).await.unwrap();
        a.refactor("identifierChange", &json!({ "oldName": "a", "newName": "b" }))
            .await
            .unwrap();
        assert_eq!(storage.text("/p/a.js"), "var b = 1;");
    }

    #[tokio::test]
    async fn test_refactor_before_load_uses_stored_text() {
        let storage = TestStorage::with_file("/p/a.js", "// keep\nvar a = 1;");
        let mut a = file("/p/a.js", &storage);

        a.refactor("notAnAction", &json!({})).await.unwrap();
        assert_eq!(storage.text("/p/a.js"), "// keep\nvar a = 1;");

        a.refactor("identifierChange", &json!({ "oldName": "a", "newName": "b" }))
            .await
            .unwrap();
        assert_eq!(storage.text("/p/a.js"), "// keep\nvar b = 1;");
        assert_eq!(a.state(), FileState::Unloaded);
    }

    #[tokio::test]
    async fn test_refactor_before_load_on_missing_file() {
        let storage = Arc::new(TestStorage::default());
        let mut a = file("/p/a.js", &storage);

        let err = a.refactor("notAnAction", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Parsing \"/p/a.js\" failed.");
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // JSON PROJECTION
    // ═══════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_to_json() {
        let storage = TestStorage::with_file("/p/a.js", "/* not json */ var a;");
        let mut a = file("/p/a.js", &storage);
        assert_eq!(a.path(), Path::new("/p/a.js"));
        a.load(&mut ReferenceGraph::default()).await.unwrap();

        let value = a.to_json();
        assert_eq!(value["meta"], serde_json::Value::Null);
        assert_eq!(value["ast"]["program"]["type"], json!("Program"));
        assert_eq!(value["ast"]["comments"][0]["value"], json!(" not json "));
        assert_eq!(
            value["ast"]["program"]["children"][0]["type"],
            json!("VariableDeclaration")
        );
    }

    #[tokio::test]
    async fn test_query() {
        let storage = TestStorage::with_file("/p/a.js", "function f(a) { return a; }");
        let mut a = file("/p/a.js", &storage);
        a.load(&mut ReferenceGraph::default()).await.unwrap();

        let selector = crate::selector::Selector::parse("ReturnStatement Identifier").unwrap();
        let found = a.query(&selector);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_deref(), Some("a"));
    }
}
