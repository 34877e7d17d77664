//! File-backed JSON document store.
//!
//! One document per file. Every mutation rewrites the whole document via a
//! sibling temp file and rename, so a document on disk is always a complete
//! snapshot and survives process restart. A per-document mutex serializes
//! reads and writes; the factory's cache guarantees at most one store
//! instance per id per process, which is what makes that mutex sufficient.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::context::Context;
use crate::error::CognitoError;

/// A single JSON document addressed by key paths.
///
/// Keys are ordered paths of object keys; a one-element path addresses a
/// top-level key. `set` creates intermediate objects as needed.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get(&self, ctx: &Context, key: &[&str]) -> Result<Option<Value>, CognitoError>;
    async fn set(&self, ctx: &Context, key: &[&str], value: Value) -> Result<(), CognitoError>;
    async fn delete(&self, ctx: &Context, key: &[&str]) -> Result<(), CognitoError>;
    async fn get_root(&self, ctx: &Context) -> Result<Value, CognitoError>;
}

pub struct FileDataStore {
    path: PathBuf,
    document: Mutex<Value>,
}

impl FileDataStore {
    fn new(path: PathBuf, document: Value) -> Self {
        Self {
            path,
            document: Mutex::new(document),
        }
    }

    /// Snapshot the whole document to disk: write a sibling temp file, then
    /// rename over the real one.
    async fn persist(&self, document: &Value) -> Result<(), CognitoError> {
        let rendered = serde_json::to_vec_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &rendered).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for FileDataStore {
    async fn get(&self, _ctx: &Context, key: &[&str]) -> Result<Option<Value>, CognitoError> {
        let document = self.document.lock().await;
        let mut current = &*document;
        for part in key {
            match current.get(part) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current.clone()))
    }

    async fn set(&self, ctx: &Context, key: &[&str], value: Value) -> Result<(), CognitoError> {
        if key.is_empty() {
            return Err(CognitoError::Internal("empty data store key".into()));
        }

        let mut document = self.document.lock().await;
        let (last, parents) = key.split_last().expect("checked non-empty");

        let mut current = &mut *document;
        for part in parents {
            if !current.get(part).map(Value::is_object).unwrap_or(false) {
                current[*part] = Value::Object(Default::default());
            }
            current = current.get_mut(part).expect("just inserted");
        }
        current[*last] = value;

        tracing::debug!(request_id = %ctx.request_id, path = %self.path.display(), key = ?key, "persisting document");
        self.persist(&document).await
    }

    async fn delete(&self, ctx: &Context, key: &[&str]) -> Result<(), CognitoError> {
        if key.is_empty() {
            return Err(CognitoError::Internal("empty data store key".into()));
        }

        let mut document = self.document.lock().await;
        let (last, parents) = key.split_last().expect("checked non-empty");

        let mut current = &mut *document;
        for part in parents {
            match current.get_mut(part) {
                Some(next) => current = next,
                None => return Ok(()),
            }
        }
        if let Some(obj) = current.as_object_mut() {
            obj.remove(*last);
        }

        tracing::debug!(request_id = %ctx.request_id, path = %self.path.display(), key = ?key, "persisting document");
        self.persist(&document).await
    }

    async fn get_root(&self, _ctx: &Context) -> Result<Value, CognitoError> {
        Ok(self.document.lock().await.clone())
    }
}

/// Opens and caches one [`FileDataStore`] per document id.
pub struct DataStoreFactory {
    directory: PathBuf,
    cache: Mutex<HashMap<String, Arc<FileDataStore>>>,
}

impl DataStoreFactory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }

    async fn read_document(path: &Path) -> Result<Option<Value>, CognitoError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Open the document for `id`, creating it from `defaults` when no file
    /// exists. An existing file has missing top-level keys merged in from
    /// `defaults` without overwriting stored values.
    pub async fn create(
        &self,
        ctx: &Context,
        id: &str,
        defaults: Value,
    ) -> Result<Arc<dyn DataStore>, CognitoError> {
        let mut cache = self.cache.lock().await;
        if let Some(store) = cache.get(id) {
            return Ok(store.clone());
        }

        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.file_path(id);

        let document = match Self::read_document(&path).await? {
            Some(mut existing) => {
                if let (Some(doc), Some(defaults)) =
                    (existing.as_object_mut(), defaults.as_object())
                {
                    for (key, value) in defaults {
                        doc.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
                existing
            }
            None => defaults,
        };

        let store = Arc::new(FileDataStore::new(path, document.clone()));
        store.persist(&document).await?;
        cache.insert(id.to_string(), store.clone());

        tracing::debug!(request_id = %ctx.request_id, id, "opened data store");
        Ok(store)
    }

    /// Open the document for `id` if its file exists; `None` otherwise.
    pub async fn get(
        &self,
        ctx: &Context,
        id: &str,
    ) -> Result<Option<Arc<dyn DataStore>>, CognitoError> {
        let mut cache = self.cache.lock().await;
        if let Some(store) = cache.get(id) {
            return Ok(Some(store.clone()));
        }

        let path = self.file_path(id);
        match Self::read_document(&path).await? {
            Some(document) => {
                let store = Arc::new(FileDataStore::new(path, document));
                cache.insert(id.to_string(), store.clone());
                tracing::debug!(request_id = %ctx.request_id, id, "opened data store");
                Ok(Some(store))
            }
            None => Ok(None),
        }
    }

    /// Remove the document's file and evict it from the cache.
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), CognitoError> {
        let mut cache = self.cache.lock().await;
        cache.remove(id);

        let path = self.file_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(request_id = %ctx.request_id, id, "deleted data store");
        Ok(())
    }

    /// Ids of every document currently on disk.
    pub async fn list_ids(&self) -> Result<Vec<String>, CognitoError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
