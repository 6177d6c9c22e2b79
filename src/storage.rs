//! Storage collaborators.
//!
//! Only reading and writing suspend; everything else in a file operation is
//! synchronous.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[allow(async_fn_in_trait)]
pub trait Storage {
    async fn read(&self, path: &Path) -> io::Result<String>;

    async fn write(&self, path: &Path, text: &str) -> io::Result<()>;
}

/// Disk-backed storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    async fn read(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, text: &str) -> io::Result<()> {
        tokio::fs::write(path, text).await
    }
}

/// In-memory storage keyed by path.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.lock().insert(path.into(), text.into());
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.lock().get(path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        // A poisoned map still holds consistent whole-file entries
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    async fn read(&self, path: &Path) -> io::Result<String> {
        self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    async fn write(&self, path: &Path, text: &str) -> io::Result<()> {
        self.insert(path, text);
        Ok(())
    }
}
