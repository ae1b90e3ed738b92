//! Time-based response caching for Redfish transports.
//!
//! [`CachedTransport`] decorates any [`Transport`] with a TTL cache of
//! successful responses. Expiry is judged against an injected [`Clock`],
//! so cache behavior is fully testable with a fake clock. Callers above
//! the transport cannot tell a cached response from a wire response.

use crate::redfish::transport::{Transport, TransportError, TransportResponse};
use crate::time::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Cached response with metadata.
struct CacheEntry {
    response: TransportResponse,
    /// When the entry was fetched from the inner transport.
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at > ttl
    }
}

/// TTL response cache over an inner transport.
///
/// Only successful (2xx) responses are cached; errors and non-2xx codes
/// always go back to the inner transport on the next request.
pub struct CachedTransport<T> {
    inner: T,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<T: Transport> CachedTransport<T> {
    /// Wrap `inner` with a cache holding entries for `ttl`.
    pub fn new(inner: T, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Invalidate (remove) the cached response for `path`.
    pub fn invalidate(&self, path: &str) {
        self.entries.lock().unwrap().remove(path);
    }

    /// Remove all expired entries.
    pub fn cleanup_expired(&self) {
        let now = self.clock.now();
        self.entries
            .lock()
            .unwrap()
            .retain(|_, entry| !entry.is_expired(now, self.ttl));
    }

    /// Number of cached responses (including expired).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl<T: Transport> Transport for CachedTransport<T> {
    fn root_uri(&self) -> &str {
        self.inner.root_uri()
    }

    fn get(&self, path: &str) -> Result<TransportResponse, TransportError> {
        let now = self.clock.now();
        {
            let entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get(path) {
                if !entry.is_expired(now, self.ttl) {
                    return Ok(entry.response.clone());
                }
            }
        }

        let response = self.inner.get(path)?;
        if response.is_success() {
            self.entries.lock().unwrap().insert(
                path.to_string(),
                CacheEntry {
                    response: response.clone(),
                    fetched_at: now,
                },
            );
        }
        Ok(response)
    }
}
