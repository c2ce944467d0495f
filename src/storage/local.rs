use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use super::{ObjectStore, StorageError};

/// Object store rooted at a local directory.
///
/// Object paths map onto files below the root; `list` walks the whole tree and matches the
/// `/`-joined relative path against the prefix.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, source: std::io::Error) -> StorageError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io {
            path: path.to_string(),
            source,
        }
    }
}

fn walk_sorted(root: &Path, prefix: &str) -> Result<Vec<String>, StorageError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|error| StorageError::Io {
            path: root.display().to_string(),
            source: error.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if key.starts_with(prefix) {
            paths.push(key);
        }
    }
    paths.sort();
    Ok(paths)
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|error| io_error(path, error))
    }

    async fn write(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| io_error(path, error))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|error| io_error(path, error))?;
        tracing::debug!(path, "Wrote object to local store");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || walk_sorted(&root, &prefix))
            .await
            .map_err(|error| StorageError::Io {
                path: self.root.display().to_string(),
                source: std::io::Error::other(error.to_string()),
            })?
    }
}
