//! Key-value persistence seam.
//!
//! The engine persists small JSON values under string keys and never
//! assumes more structure than that. Production uses [`JsonFileStore`],
//! one JSON object in a file rewritten atomically on every set. Tests
//! use [`MemoryStore`] with failure injection.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::fs;

use crate::error::{Result, WardenError};

/// Durable string-keyed JSON storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value. `Ok(None)` means the key has never been written;
    /// `Err` means the backing store could not be read at all.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value durably before returning.
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Store backed by a single JSON object file.
///
/// Writes go to a sibling temp file first and land via rename, so a crash
/// mid-write leaves the previous contents intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_map(&self) -> Result<Map<String, Value>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let value: Value = serde_json::from_str(&content)?;
                match value {
                    Value::Object(map) => Ok(map),
                    other => Err(WardenError::Store(format!(
                        "store file {} holds {} instead of an object",
                        self.path.display(),
                        kind_of(&other)
                    ))),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(map.clone()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let map = self.read_map().await?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.read_map().await.unwrap_or_default();
        map.insert(key.to_string(), value);
        self.write_map(&map).await
    }
}

#[derive(Default)]
struct MemoryStoreState {
    map: HashMap<String, Value>,
    fail_reads: bool,
    fail_writes: bool,
}

/// In-memory store double with read and write failure injection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a key without going through the trait.
    pub fn seed(&self, key: &str, value: Value) {
        self.inner.lock().map.insert(key.to_string(), value);
    }

    /// Read a key without going through the trait, ignoring injected
    /// failures.
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.inner.lock().map.get(key).cloned()
    }

    pub fn fail_reads(&self, on: bool) {
        self.inner.lock().fail_reads = on;
    }

    pub fn fail_writes(&self, on: bool) {
        self.inner.lock().fail_writes = on;
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let state = self.inner.lock();
        if state.fail_reads {
            return Err(WardenError::Store("injected read failure".to_string()));
        }
        Ok(state.map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = self.inner.lock();
        if state.fail_writes {
            return Err(WardenError::Store("injected write failure".to_string()));
        }
        state.map.insert(key.to_string(), value);
        Ok(())
    }
}
