//! A client-side key/value cache with pluggable eviction, tag-based
//! invalidation and persistent snapshots.
//!
//! # Features
//! - **Eviction strategies**: least recently used, least frequently used,
//!   first in first out, and shortest remaining lifetime. Each keeps its own
//!   ordered structure, so picking a victim never re-sorts the cache.
//! - **TTL**: per-entry lifetimes, removed lazily on read and by a periodic
//!   background sweep.
//! - **Tags**: label entries at write time and look them up or invalidate
//!   them in bulk.
//! - **Persistence**: the whole cache state can be saved to a file or SQLite
//!   backend and restored on the next build.
//! - **Codecs**: values can be compressed (gzip) and encrypted through
//!   pluggable byte codecs.
//! - **Namespaces**: query, image and asset caches with deterministic keys
//!   and deduplicated in-flight loading.
//! - **HTTP strategies**: cache-first, network-first, stale-while-revalidate,
//!   cache-only and network-only over any response store.
//!
//! ```
//! use skein_cache::{Cache, SetOptions, Strategy};
//! use std::time::Duration;
//!
//! let cache: Cache<String> = Cache::builder()
//!   .max_size(100)
//!   .strategy(Strategy::Lru)
//!   .default_ttl(Duration::from_secs(60))
//!   .build()
//!   .unwrap();
//!
//! cache
//!   .set_with("user:1", "ada".to_string(), SetOptions::new().tag("users"))
//!   .unwrap();
//! assert_eq!(cache.get("user:1").as_deref().map(String::as_str), Some("ada"));
//! assert_eq!(cache.delete_by_tag("users"), 1);
//! ```

// Public modules that form the API
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod handles;
pub mod http;
pub mod listener;
pub mod metrics;
pub mod namespace;
pub mod options;
pub mod policy;
pub mod runtime;
pub mod storage;
pub mod time;

// Internal, crate-only modules
mod entry;
mod loader;
mod shared;
mod snapshot;
mod store;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use codec::{Codec, GzipCodec, NullCodec};
pub use config::CacheConfig;
pub use entry::{CacheValue, EntryInfo, EntryMetadata};
pub use error::{BuildError, CacheError, CodecError, ConfigError, FetchError, Result, StorageError};
pub use handles::Cache;
pub use listener::{EvictionListener, EvictionReason};
pub use metrics::CacheStats;
pub use options::{GetOptions, SetOptions};
pub use policy::{EntryMeta, EvictionPolicy, Strategy};
pub use runtime::TaskSpawner;
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use storage::{KeyValueStore, MemoryStore, SnapshotStore, StorageBackend};
pub use time::{Clock, ManualClock, SystemClock};
