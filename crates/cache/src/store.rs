//! Keyed directory cache with prefix fallback
//!
//! Each entry lives in `{root}/{key}/` as a `cache.tar.zst` archive plus a
//! `metadata.json` describing it. Restores try the exact key first, then each
//! restore prefix in order, picking the most recently created entry that
//! shares the prefix.

use crate::archive::{self, ArchiveStats};
use crate::key::validate_key;
use crate::root::default_cache_root;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ARCHIVE_FILE: &str = "cache.tar.zst";
const METADATA_FILE: &str = "metadata.json";

/// Metadata stored next to each cache archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntryMeta {
    /// Key the entry was saved under
    pub key: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// Number of files in the cached tree
    pub files: u64,
    /// Uncompressed size of the cached tree
    pub size_bytes: u64,
}

/// Outcome of a restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRestore {
    /// The requested key was present
    Exact {
        /// Restored key
        key: String,
    },
    /// A different entry sharing a restore prefix was used
    Fallback {
        /// Restored key
        key: String,
        /// Prefix that matched
        prefix: String,
    },
    /// Nothing matched; the build starts cold
    Miss,
}

impl CacheRestore {
    /// Whether any entry was restored
    #[must_use]
    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Miss)
    }

    /// Key of the restored entry, if any
    #[must_use]
    pub fn restored_key(&self) -> Option<&str> {
        match self {
            Self::Exact { key } | Self::Fallback { key, .. } => Some(key),
            Self::Miss => None,
        }
    }

    /// Short label used in logs and reports
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exact { .. } => "exact",
            Self::Fallback { .. } => "fallback",
            Self::Miss => "miss",
        }
    }
}

/// Outcome of a save
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSave {
    /// The directory was archived under the key
    Saved(CacheEntryMeta),
    /// The cached directory does not exist, so there was nothing to store
    NothingToSave,
}

/// Key/value store for opaque directory trees
pub trait KeyValueCache: Send + Sync {
    /// Restore `key` (or the newest entry matching one of `restore_prefixes`)
    /// into `dest`.
    fn restore(&self, key: &str, restore_prefixes: &[String], dest: &Path) -> Result<CacheRestore>;

    /// Store the tree at `src` under `key`, replacing any previous entry.
    fn save(&self, key: &str, src: &Path) -> Result<CacheSave>;
}

/// Filesystem-backed cache store
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    /// Store rooted at an explicit directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the directory resolved from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(default_cache_root()?))
    }

    /// Store root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn read_meta(dir: &Path) -> Result<Option<CacheEntryMeta>> {
        let meta_path = dir.join(METADATA_FILE);
        if !meta_path.is_file() || !dir.join(ARCHIVE_FILE).is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&meta_path).map_err(|e| Error::io(e, &meta_path, "read"))?;
        let meta = serde_json::from_str(&content).map_err(|e| {
            Error::serialization(format!("{}: {e}", meta_path.display()))
        })?;
        Ok(Some(meta))
    }

    /// Look up an entry by exact key
    pub fn lookup(&self, key: &str) -> Result<Option<CacheEntryMeta>> {
        validate_key(key)?;
        Self::read_meta(&self.entry_dir(key))
    }

    /// All readable entries in the store
    pub fn entries(&self) -> Result<Vec<CacheEntryMeta>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        let dir = fs::read_dir(&self.root).map_err(|e| Error::io(e, &self.root, "read_dir"))?;
        for item in dir.filter_map(|e| e.ok()) {
            let path = item.path();
            if !path.is_dir() {
                continue;
            }
            match Self::read_meta(&path) {
                Ok(Some(meta)) => entries.push(meta),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                }
            }
        }
        Ok(entries)
    }

    /// Newest entry whose key starts with `prefix`
    pub fn newest_with_prefix(&self, prefix: &str) -> Result<Option<CacheEntryMeta>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|m| m.key.starts_with(prefix))
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.key.cmp(&b.key))
            }))
    }

    fn save_at(&self, key: &str, src: &Path, created_at: DateTime<Utc>) -> Result<CacheSave> {
        validate_key(key)?;
        if !src.is_dir() {
            tracing::warn!(key, path = %src.display(), "Cache path does not exist, nothing to save");
            return Ok(CacheSave::NothingToSave);
        }

        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir).map_err(|e| Error::io(e, &dir, "create_dir_all"))?;

        // Write beside the final name and rename so concurrent readers never
        // see a partial archive.
        let suffix = format!("{}.tmp", std::process::id());
        let tmp_archive = dir.join(format!("{ARCHIVE_FILE}.{suffix}"));
        let ArchiveStats { files, bytes } = match archive::pack_dir(src, &tmp_archive) {
            Ok(stats) => stats,
            Err(e) => {
                let _ = fs::remove_file(&tmp_archive);
                return Err(e);
            }
        };
        let archive_path = dir.join(ARCHIVE_FILE);
        fs::rename(&tmp_archive, &archive_path)
            .map_err(|e| Error::io(e, &archive_path, "rename"))?;

        let meta = CacheEntryMeta {
            key: key.to_string(),
            created_at,
            files,
            size_bytes: bytes,
        };
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| Error::serialization(format!("Failed to serialize metadata: {e}")))?;
        let tmp_meta = dir.join(format!("{METADATA_FILE}.{suffix}"));
        fs::write(&tmp_meta, json).map_err(|e| Error::io(e, &tmp_meta, "write"))?;
        let meta_path = dir.join(METADATA_FILE);
        fs::rename(&tmp_meta, &meta_path).map_err(|e| Error::io(e, &meta_path, "rename"))?;

        tracing::info!(key, files, size_bytes = bytes, "Saved cache entry");
        Ok(CacheSave::Saved(meta))
    }
}

impl KeyValueCache for LocalCacheStore {
    fn restore(&self, key: &str, restore_prefixes: &[String], dest: &Path) -> Result<CacheRestore> {
        let outcome = if self.lookup(key)?.is_some() {
            CacheRestore::Exact {
                key: key.to_string(),
            }
        } else {
            let mut found = CacheRestore::Miss;
            for prefix in restore_prefixes.iter().filter(|p| !p.is_empty()) {
                if let Some(meta) = self.newest_with_prefix(prefix)? {
                    found = CacheRestore::Fallback {
                        key: meta.key,
                        prefix: prefix.clone(),
                    };
                    break;
                }
            }
            found
        };

        match outcome.restored_key() {
            Some(restored) => {
                let archive_path = self.entry_dir(restored).join(ARCHIVE_FILE);
                archive::unpack(&archive_path, dest)?;
                tracing::info!(key, restored, kind = outcome.label(), "Restored cache");
            }
            None => tracing::info!(key, "Cache miss, starting cold"),
        }
        Ok(outcome)
    }

    fn save(&self, key: &str, src: &Path) -> Result<CacheSave> {
        self.save_at(key, src, Utc::now())
    }
}
