//! Object storage for attachment bytes
//!
//! Attachment metadata lives in SQLite; the bytes live behind an
//! `ObjectStore`. Two backends:
//! - `HttpObjectStore` - direct URL first, then the key against a base URL
//! - `LocalObjectStore` - a directory on disk

mod http;
mod local;

use std::sync::Arc;

use async_trait::async_trait;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::models::Attachment;

/// Where an attachment's bytes can be found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Direct URL or path relative to the store root
    pub path: Option<String>,
    /// Storage key, resolved by the store
    pub key: Option<String>,
}

impl ObjectLocation {
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.key.is_none()
    }

    /// Path or key, for log messages
    pub fn describe(&self) -> &str {
        self.path
            .as_deref()
            .or(self.key.as_deref())
            .unwrap_or("<none>")
    }
}

impl From<&Attachment> for ObjectLocation {
    fn from(attachment: &Attachment) -> Self {
        Self {
            path: attachment.path.clone(),
            key: attachment.file_key.clone(),
        }
    }
}

/// Async source of attachment bytes
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &str;

    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>>;
}

/// Build the store described by `[storage]`
///
/// A local root directory wins over a base URL. With neither set, the HTTP
/// store can still follow direct attachment URLs.
pub fn store_from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    if let Some(root) = &config.root_dir {
        return Ok(Arc::new(LocalObjectStore::new(root.clone())));
    }
    Ok(Arc::new(HttpObjectStore::new(config.base_url.clone())?))
}

pub(crate) fn missing_location() -> Error {
    Error::NotFound("attachment has neither a path nor a storage key".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_location_from_attachment() {
        let attachment = Attachment {
            id: 1,
            transaction_id: 2,
            name: "receipt.pdf".to_string(),
            path: None,
            file_key: Some("vault/receipt.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            size: None,
        };
        let location = ObjectLocation::from(&attachment);
        assert!(!location.is_empty());
        assert_eq!(location.describe(), "vault/receipt.pdf");
        assert!(ObjectLocation::default().is_empty());
    }

    #[test]
    fn test_store_from_config_prefers_local() {
        let config = StorageConfig {
            base_url: Some("http://localhost:9".into()),
            root_dir: Some(PathBuf::from("/tmp")),
        };
        assert_eq!(store_from_config(&config).unwrap().name(), "local");

        let config = StorageConfig::default();
        assert_eq!(store_from_config(&config).unwrap().name(), "http");
    }
}
