//! Cache collaborator for the Spyglass metrics engine.
//!
//! `spyglass-cache` defines the key/value contract the query service uses
//! to reuse previously computed results, and ships an in-memory backend
//! for single-process deployments and tests. Entries are scoped by
//! organization, carry an optional TTL, and hold serde-marshaled payloads
//! tagged with their type so a lookup into the wrong destination type is
//! an invalid-input error rather than silent garbage.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use serde::{Deserialize, Serialize};
//! use spyglass_cache::{Cache, Cacheable, InMemoryCache, RetrieveStatus};
//!
//! #[derive(Serialize, Deserialize, Default, PartialEq, Debug)]
//! struct CachedSeries {
//!     values: Vec<f64>,
//! }
//! impl Cacheable for CachedSeries {}
//!
//! let cache = InMemoryCache::new();
//! let payload = CachedSeries { values: vec![1.0, 2.0] };
//! cache
//!     .store("org-1", "range:abc", &payload, Some(Duration::from_secs(60)))
//!     .unwrap();
//!
//! let mut dest = CachedSeries::default();
//! let status = cache.retrieve("org-1", "range:abc", &mut dest, false).unwrap();
//! assert_eq!(status, RetrieveStatus::Hit);
//! assert_eq!(dest, payload);
//! ```

#![doc(html_root_url = "https://docs.rs/spyglass-cache/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod memory;
pub mod traits;

// Re-export main entry points at crate root
pub use error::{CacheError, Result};
pub use memory::InMemoryCache;
pub use traits::{Cache, Cacheable, RetrieveStatus};
