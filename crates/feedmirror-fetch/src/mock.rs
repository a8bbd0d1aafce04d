//! In-memory transport for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use url::Url;

use crate::transport::{Transport, TransportResponse};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MockError {
    #[error("404 Not Found: {0}")]
    NotFound(String),

    #[error("connection reset while reading {0}")]
    Reset(String),
}

#[derive(Debug, Clone)]
enum Route {
    Body(Bytes),
    /// Yields the bytes, then fails before the stream ends.
    Broken(Bytes),
}

/// Serves registered URLs from memory and records every request.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    routes:   Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self { Self::default() }

    pub fn serve(&self, url: &str, body: impl Into<Bytes>) {
        self.insert(url, Route::Body(body.into()));
    }

    /// Serve `prefix` and then reset the connection.
    pub fn serve_broken(&self, url: &str, prefix: impl Into<Bytes>) {
        self.insert(url, Route::Broken(prefix.into()));
    }

    pub fn remove(&self, url: &str) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.remove(url);
        }
    }

    /// URLs opened so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn clear_requests(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    fn insert(&self, url: &str, route: Route) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), route);
        }
    }

    fn route(&self, url: &str) -> Option<Route> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.routes.lock().ok().and_then(|routes| routes.get(url).cloned())
    }
}

const CHUNK: usize = 16 * 1024;

impl Transport for MemoryTransport {
    type Error = MockError;

    async fn open(&self, url: &Url) -> Result<TransportResponse<Self::Error>, Self::Error> {
        let key = url.as_str().to_string();
        let (data, broken) = match self.route(&key) {
            Some(Route::Body(data)) => (data, false),
            Some(Route::Broken(data)) => (data, true),
            None => return Err(MockError::NotFound(key)),
        };

        let mut items: Vec<Result<Bytes, MockError>> = (0..data.len())
            .step_by(CHUNK)
            .map(|start| Ok(data.slice(start..(start + CHUNK).min(data.len()))))
            .collect();
        if broken {
            items.push(Err(MockError::Reset(key)));
        }

        Ok(TransportResponse {
            content_length: (!broken).then_some(data.len() as u64),
            body:           Box::pin(futures_util::stream::iter(items)),
        })
    }
}
