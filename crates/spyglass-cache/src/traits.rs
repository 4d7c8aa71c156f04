//! The cache collaborator interface.
//!
//! The engine itself never touches the cache; the surrounding service does,
//! keying entries by organization plus a request fingerprint. The trait
//! here pins down the contract an implementation must honor, most
//! importantly that a missing key is a status and not an error, and that a
//! type mismatch between the cached entry and the destination is an
//! invalid-input error distinct from a plain miss.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Marker for payloads a cache can hold.
///
/// Payloads are marshaled through serde, so any serializable type opts in
/// with an empty impl. The type tag identifies the cached representation
/// at retrieval time; the default derives it from the Rust type name.
pub trait Cacheable: Serialize + DeserializeOwned {
    /// Stable tag identifying the cached representation.
    #[must_use]
    fn type_tag() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveStatus {
    /// The entry was found and decoded into the destination.
    Hit,
    /// Part of the requested data was found; the caller must fetch the
    /// rest. Implementations serving time windows use this, the in-memory
    /// cache never does.
    PartialHit,
    /// No live entry exists under the key. Not an error.
    KeyMiss,
    /// The lookup itself failed. Callers record this status when a
    /// retrieve call returns an error.
    Error,
}

impl RetrieveStatus {
    /// Lowercase label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::PartialHit => "partial_hit",
            Self::KeyMiss => "key_miss",
            Self::Error => "error",
        }
    }
}

/// A key/value cache scoped by organization.
///
/// Entries live under `(org_id, key)` so tenants never observe each
/// other's data. A `ttl` of `None` means the entry does not expire.
pub trait Cache: Send + Sync {
    /// Stores `value` under `(org_id, key)`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidInput`](crate::CacheError::InvalidInput)
    /// when the payload does not serialize.
    fn store<T: Cacheable>(
        &self,
        org_id: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Looks up `(org_id, key)` and decodes the entry into `dest`.
    ///
    /// An expired entry counts as a miss unless `allow_expired` is set.
    /// On any status other than [`RetrieveStatus::Hit`] the destination is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidInput`](crate::CacheError::InvalidInput)
    /// when the entry holds a different type than `T`, and
    /// [`CacheError::Internal`](crate::CacheError::Internal) when the
    /// cached representation does not decode.
    fn retrieve<T: Cacheable>(
        &self,
        org_id: &str,
        key: &str,
        dest: &mut T,
        allow_expired: bool,
    ) -> Result<RetrieveStatus>;

    /// Replaces the expiry of an existing entry. `None` makes the entry
    /// permanent. A missing key is a no-op.
    fn set_ttl(&self, org_id: &str, key: &str, ttl: Option<Duration>);

    /// Forgets the entry under `(org_id, key)`, if any.
    fn remove(&self, org_id: &str, key: &str);

    /// Forgets every listed key under `org_id`.
    fn bulk_remove(&self, org_id: &str, keys: &[String]);
}
