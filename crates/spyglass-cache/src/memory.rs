//! In-memory cache backend.
//!
//! Entries live in a process-wide map behind a read/write lock. Expiry is
//! lazy: an expired entry stays in the map and is reported as a miss until
//! it is overwritten or removed. TTL bookkeeping uses wall-clock
//! timestamps so `set_ttl` can both shorten and extend the life of an
//! entry after the fact.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::traits::{Cache, Cacheable, RetrieveStatus};

struct Entry {
    tag: &'static str,
    payload: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// A [`Cache`] backed by a locked in-process map.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn scoped(org_id: &str, key: &str) -> (String, String) {
    (org_id.to_string(), key.to_string())
}

fn expiry(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    ttl.map(|ttl| Utc::now() + chrono::Duration::milliseconds(ttl.as_millis() as i64))
}

impl Cache for InMemoryCache {
    fn store<T: Cacheable>(
        &self,
        org_id: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let payload = serde_json::to_value(value).map_err(|err| CacheError::InvalidInput {
            key: key.to_string(),
            message: format!("payload does not serialize: {err}"),
        })?;
        let entry = Entry {
            tag: T::type_tag(),
            payload,
            expires_at: expiry(ttl),
        };
        self.entries.write().insert(scoped(org_id, key), entry);
        debug!(org_id, key, ttl_ms = ttl.map(|t| t.as_millis() as u64), "stored cache entry");
        Ok(())
    }

    fn retrieve<T: Cacheable>(
        &self,
        org_id: &str,
        key: &str,
        dest: &mut T,
        allow_expired: bool,
    ) -> Result<RetrieveStatus> {
        let entries = self.entries.read();
        let Some(entry) = entries.get(&scoped(org_id, key)) else {
            return Ok(RetrieveStatus::KeyMiss);
        };
        if entry.expired(Utc::now()) && !allow_expired {
            debug!(org_id, key, "cache entry expired");
            return Ok(RetrieveStatus::KeyMiss);
        }
        if entry.tag != T::type_tag() {
            return Err(CacheError::InvalidInput {
                key: key.to_string(),
                message: format!("cached entry holds {}, requested {}", entry.tag, T::type_tag()),
            });
        }
        *dest = serde_json::from_value(entry.payload.clone()).map_err(|err| {
            CacheError::Internal {
                key: key.to_string(),
                message: format!("cached payload does not decode: {err}"),
            }
        })?;
        Ok(RetrieveStatus::Hit)
    }

    fn set_ttl(&self, org_id: &str, key: &str, ttl: Option<Duration>) {
        if let Some(entry) = self.entries.write().get_mut(&scoped(org_id, key)) {
            entry.expires_at = expiry(ttl);
        }
    }

    fn remove(&self, org_id: &str, key: &str) {
        self.entries.write().remove(&scoped(org_id, key));
    }

    fn bulk_remove(&self, org_id: &str, keys: &[String]) {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(&scoped(org_id, key));
        }
        debug!(org_id, removed = keys.len(), "bulk-removed cache entries");
    }
}
