//! HTTP object store
//!
//! Attachments carry either a direct URL, a storage key, or both. The direct
//! URL is tried first; on failure the key is resolved against `base_url`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{missing_location, ObjectLocation, ObjectStore};
use crate::error::{Error, Result};

/// Connection setup limit; the full fetch is bounded by `fetch_timeout`
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpObjectStore {
    http_client: Client,
    base_url: Option<String>,
}

impl HttpObjectStore {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let http_client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// URLs to try, in order
    fn candidate_urls(&self, location: &ObjectLocation) -> Vec<String> {
        let mut urls = Vec::new();

        if let Some(path) = location.path.as_deref() {
            if is_absolute_url(path) {
                urls.push(path.to_string());
            } else if location.key.is_none() {
                if let Some(base) = &self.base_url {
                    urls.push(format!("{}/{}", base, path.trim_start_matches('/')));
                }
            }
        }

        if let (Some(key), Some(base)) = (location.key.as_deref(), &self.base_url) {
            urls.push(format!("{}/{}", base, key.trim_start_matches('/')));
        }

        urls
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("Object not found: {}", url)));
        }
        if status.is_server_error() {
            return Err(Error::StorageConnection(format!(
                "{} returned {}",
                url, status
            )));
        }
        if !status.is_success() {
            return Err(Error::Storage(format!("{} returned {}", url, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_send_error(url, e))?;
        Ok(bytes.to_vec())
    }
}

fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn classify_send_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        Error::StorageConnection(format!("{}: {}", url, e))
    } else {
        Error::Http(e)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let urls = self.candidate_urls(location);
        let mut last_err = None;

        for url in &urls {
            match self.get(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    debug!(url = %url, error = %e, "Object fetch attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(missing_location))
    }
}
