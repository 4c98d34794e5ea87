//! Weekly build cache for docpub
//!
//! This crate provides the cache the publishing pipeline restores before
//! installing dependencies and saves after a successful publish:
//! - Weekly cache keys (`prefix` + two-digit ISO week)
//! - The [`KeyValueCache`] contract the pipeline depends on
//! - [`LocalCacheStore`], a filesystem store of tar.zst archives with
//!   prefix fallback restore
//!
//! Cache content is advisory. A miss only means a slower build.

mod error;
pub mod archive;
pub mod key;
pub mod root;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use key::{DEFAULT_CACHE_PREFIX, cache_key, cache_key_now, validate_key};
pub use root::{CACHE_DIR_ENV, default_cache_root};
pub use store::{CacheEntryMeta, CacheRestore, CacheSave, KeyValueCache, LocalCacheStore};
