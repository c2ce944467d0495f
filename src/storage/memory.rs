use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{ObjectStore, StorageError};

/// In-process object store, handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without going through the async trait.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects().insert(
            path.into(),
            StoredObject {
                bytes: bytes.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Content type recorded for `path`, if the object exists.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects()
            .get(path)
            .map(|object| object.content_type.clone())
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects()
            .get(path)
            .map(|object| object.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn write(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects().insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects()
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }
}
