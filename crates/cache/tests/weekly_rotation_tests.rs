//! End-to-end behavior of the weekly cache across runs

use chrono::NaiveDate;
use docpub_cache::{
    CacheRestore, CacheSave, DEFAULT_CACHE_PREFIX, KeyValueCache, LocalCacheStore, cache_key,
};
use std::fs;
use tempfile::TempDir;

fn restore_prefixes() -> Vec<String> {
    vec![DEFAULT_CACHE_PREFIX.to_string()]
}

#[test]
fn new_week_falls_back_then_saves_its_own_key() {
    let store_dir = TempDir::new().unwrap();
    let store = LocalCacheStore::new(store_dir.path());
    let work = TempDir::new().unwrap();
    let cache_dir = work.path().join(".cache");

    let last_week = cache_key(
        DEFAULT_CACHE_PREFIX,
        NaiveDate::from_ymd_opt(2025, 6, 25).unwrap(),
    );
    let this_week = cache_key(
        DEFAULT_CACHE_PREFIX,
        NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
    );
    assert_eq!(last_week, "mkdocs-material-26");
    assert_eq!(this_week, "mkdocs-material-27");

    // First run ever: cold cache, the build populates .cache, then save
    let first = store
        .restore(&last_week, &restore_prefixes(), &cache_dir)
        .unwrap();
    assert_eq!(first, CacheRestore::Miss);
    fs::create_dir_all(cache_dir.join("social")).unwrap();
    fs::write(cache_dir.join("social/index.png"), b"card").unwrap();
    assert!(matches!(
        store.save(&last_week, &cache_dir).unwrap(),
        CacheSave::Saved(_)
    ));

    // Next week, fresh working copy: fallback to last week's entry
    fs::remove_dir_all(&cache_dir).unwrap();
    let second = store
        .restore(&this_week, &restore_prefixes(), &cache_dir)
        .unwrap();
    assert_eq!(second.restored_key(), Some(last_week.as_str()));
    assert!(matches!(second, CacheRestore::Fallback { .. }));
    assert_eq!(fs::read(cache_dir.join("social/index.png")).unwrap(), b"card");

    // Saving after a fallback hit writes the new key
    store.save(&this_week, &cache_dir).unwrap();
    let third = store
        .restore(&this_week, &restore_prefixes(), &cache_dir)
        .unwrap();
    assert_eq!(
        third,
        CacheRestore::Exact {
            key: this_week.clone()
        }
    );

    let mut keys: Vec<_> = store
        .entries()
        .unwrap()
        .into_iter()
        .map(|m| m.key)
        .collect();
    keys.sort();
    assert_eq!(keys, vec![last_week, this_week]);
}

#[test]
fn store_is_usable_through_trait_object() {
    let store_dir = TempDir::new().unwrap();
    let cache: Box<dyn KeyValueCache> = Box::new(LocalCacheStore::new(store_dir.path()));
    let dest = TempDir::new().unwrap();
    let outcome = cache.restore("k-01", &[], dest.path()).unwrap();
    assert!(!outcome.is_hit());
}
