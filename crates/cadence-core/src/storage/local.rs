//! Local filesystem object store

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{missing_location, ObjectLocation, ObjectStore};
use crate::error::{Error, Result};

/// Objects stored as files under one root directory
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative name under the root, refusing to escape it
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::Validation(format!(
                "Invalid object path: {}",
                name
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let name = location
            .key
            .as_deref()
            .or(location.path.as_deref())
            .ok_or_else(missing_location)?;
        let path = self.resolve(name)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "Object not found: {}",
                path.display()
            ))),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_by_key_and_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vault")).unwrap();
        std::fs::write(dir.path().join("vault/a.txt"), b"hello").unwrap();

        let store = LocalObjectStore::new(dir.path());
        let by_key = ObjectLocation {
            path: None,
            key: Some("vault/a.txt".into()),
        };
        assert_eq!(store.fetch(&by_key).await.unwrap(), b"hello");

        let by_path = ObjectLocation {
            path: Some("/vault/a.txt".into()),
            key: None,
        };
        assert_eq!(store.fetch(&by_path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_missing_and_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let missing = ObjectLocation {
            path: None,
            key: Some("nope.bin".into()),
        };
        assert!(matches!(
            store.fetch(&missing).await,
            Err(Error::NotFound(_))
        ));

        let escaping = ObjectLocation {
            path: None,
            key: Some("../etc/passwd".into()),
        };
        assert!(matches!(
            store.fetch(&escaping).await,
            Err(Error::Validation(_))
        ));

        assert!(store.fetch(&ObjectLocation::default()).await.is_err());
    }
}
