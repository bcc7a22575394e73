//! Test utilities for cadence-core
//!
//! This module provides testing infrastructure including a mock object
//! storage server and an in-memory object store that records how many
//! fetches ran at once.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::storage::{ObjectLocation, ObjectStore};

#[derive(Default)]
struct StorageState {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    failing: RwLock<HashSet<String>>,
}

/// Mock object storage server for testing and development
///
/// Serves `GET /{key}`: stored bytes, 500 for keys marked failing, 404 otherwise.
pub struct MockStorageServer {
    addr: SocketAddr,
    state: Arc<StorageState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockStorageServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Arc::new(StorageState::default());
        let app = Router::new()
            .route("/*key", get(handle_get))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Serve `bytes` under `key`
    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.state
            .objects
            .write()
            .unwrap()
            .insert(key.trim_start_matches('/').to_string(), bytes);
    }

    /// Answer `key` with a 500
    pub fn fail(&self, key: &str) {
        self.state
            .failing
            .write()
            .unwrap()
            .insert(key.trim_start_matches('/').to_string());
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockStorageServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_get(State(state): State<Arc<StorageState>>, Path(key): Path<String>) -> Response {
    if state.failing.read().unwrap().contains(&key) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable").into_response();
    }
    match state.objects.read().unwrap().get(&key) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// In-memory object store keyed by storage key
///
/// Counts calls and tracks the peak number of concurrent fetches.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every fetch for `delay` so overlapping fetches are observable
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), bytes);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = location.key.as_deref().or(location.path.as_deref());
        let result = match key.and_then(|k| self.objects.read().unwrap().get(k).cloned()) {
            Some(bytes) => Ok(bytes),
            None => Err(Error::NotFound(format!(
                "Object not found: {}",
                location.describe()
            ))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_storage_server_serves_bytes() {
        let server = MockStorageServer::start().await;
        server.put("a/b.txt", b"abc".to_vec());

        let client = reqwest::Client::new();
        let ok = client
            .get(format!("{}/a/b.txt", server.url()))
            .send()
            .await
            .unwrap();
        assert!(ok.status().is_success());
        assert_eq!(ok.bytes().await.unwrap().as_ref(), b"abc");

        let missing = client
            .get(format!("{}/nope", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_memory_store_counts_calls() {
        let store = MemoryObjectStore::new();
        store.put("k", vec![1, 2, 3]);
        let hit = ObjectLocation {
            path: None,
            key: Some("k".into()),
        };
        assert_eq!(store.fetch(&hit).await.unwrap(), vec![1, 2, 3]);
        assert!(store.fetch(&ObjectLocation::default()).await.is_err());
        assert_eq!(store.calls(), 2);
        assert_eq!(store.max_in_flight(), 1);
    }
}
