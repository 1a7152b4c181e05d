//! Whole-document JSON persistence.
//!
//! A document is loaded in full, changed in memory and saved in full. The
//! file-backed store replaces a document by writing a sibling temp file and
//! renaming it over the target, so readers see either the old or the new
//! document, never a torn one. Nothing here locks: two processes saving the
//! same document race and the last rename wins.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::Result;

pub const CHALLENGES_DOC: &str = "challenges.json";
pub const PROGRESS_DOC: &str = "progress.json";
pub const REVIEWS_DOC: &str = "reviews.json";

/// Load/save capability for named JSON documents.
pub trait DocumentStore {
    /// Returns `None` when the document has never been saved.
    fn load(&self, name: &str) -> Result<Option<JsonValue>>;

    /// Replace the named document with `value`.
    fn save(&self, name: &str, value: &JsonValue) -> Result<()>;
}

/// Load a typed document, or `T::default()` if it does not exist yet.
pub fn load_document<T>(store: &dyn DocumentStore, name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.load(name)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(T::default()),
    }
}

/// Serialize and save a typed document.
pub fn save_document<T: Serialize>(store: &dyn DocumentStore, name: &str, doc: &T) -> Result<()> {
    let value = serde_json::to_value(doc)?;
    store.save(name, &value)
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

/// One pretty-printed JSON file per document under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Use `root` as the document directory, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing the named document.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, name: &str) -> Result<Option<JsonValue>> {
        let path = self.path_of(name);
        if !path.exists() {
            debug!(document = name, "document absent, using default");
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let value: JsonValue = serde_json::from_str(&content)?;
        debug!(document = name, bytes = content.len(), "document loaded");
        Ok(Some(value))
    }

    fn save(&self, name: &str, value: &JsonValue) -> Result<()> {
        let payload = serde_json::to_string_pretty(value)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(payload.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_of(name))?;
        debug!(document = name, bytes = payload.len(), "document saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory store
// ---------------------------------------------------------------------------

/// Keeps documents in process memory. Data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryStore {
    fn docs(&self) -> std::sync::MutexGuard<'_, HashMap<String, JsonValue>> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.docs().get(name).cloned())
    }

    fn save(&self, name: &str, value: &JsonValue) -> Result<()> {
        self.docs().insert(name.to_string(), value.clone());
        Ok(())
    }
}
