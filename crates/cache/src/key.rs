//! Weekly cache keys
//!
//! A key is the configured prefix followed by the two-digit ISO-8601 week of the
//! UTC date, so the cache rotates every Monday and two runs in the same week
//! share an entry.

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate, Utc};

/// Prefix used by the MkDocs Material publishing workflow
pub const DEFAULT_CACHE_PREFIX: &str = "mkdocs-material-";

/// Cache key for the ISO week containing `date`
#[must_use]
pub fn cache_key(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}{:02}", date.iso_week().week())
}

/// Cache key for the current UTC week
#[must_use]
pub fn cache_key_now(prefix: &str) -> String {
    cache_key(prefix, Utc::now().date_naive())
}

/// Check that a key can name a store entry
pub fn validate_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "key is empty"
    } else if key == "." || key == ".." {
        "key is a relative path component"
    } else if key.contains(['/', '\\']) {
        "key contains a path separator"
    } else if key.starts_with('.') {
        "key starts with a dot"
    } else if key.chars().any(char::is_control) {
        "key contains control characters"
    } else {
        return Ok(());
    };
    Err(Error::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_27_key() {
        assert_eq!(
            cache_key(DEFAULT_CACHE_PREFIX, date(2025, 7, 2)),
            "mkdocs-material-27"
        );
    }

    #[test]
    fn single_digit_weeks_are_zero_padded() {
        assert_eq!(cache_key("p-", date(2025, 1, 8)), "p-02");
    }

    #[test]
    fn year_boundary_follows_iso_weeks() {
        // 2024-12-30 is a Monday that belongs to ISO week 1 of 2025
        assert_eq!(cache_key("p-", date(2024, 12, 30)), "p-01");
        // 2021-01-03 is a Sunday still in ISO week 53 of 2020
        assert_eq!(cache_key("p-", date(2021, 1, 3)), "p-53");
    }

    #[test]
    fn monday_rotates_key() {
        let sunday = cache_key("p-", date(2025, 7, 6));
        let monday = cache_key("p-", date(2025, 7, 7));
        assert_ne!(sunday, monday);
    }

    #[test]
    fn now_key_has_prefix() {
        let key = cache_key_now(DEFAULT_CACHE_PREFIX);
        assert!(key.starts_with(DEFAULT_CACHE_PREFIX));
        assert_eq!(key.len(), DEFAULT_CACHE_PREFIX.len() + 2);
    }

    #[test]
    fn rejects_unsafe_keys() {
        for bad in ["", ".", "..", "a/b", "a\\b", ".hidden", "tab\tkey"] {
            assert!(validate_key(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(validate_key("mkdocs-material-27").is_ok());
    }

    proptest! {
        #[test]
        fn same_week_same_key(days in 0i64..3650) {
            let d = date(2020, 1, 1) + chrono::Duration::days(days);
            let monday = d - chrono::Duration::days(i64::from(d.weekday().num_days_from_monday()));
            prop_assert_eq!(cache_key("k-", d), cache_key("k-", monday));
        }

        #[test]
        fn key_is_two_digit_week(days in 0i64..3650) {
            let d = date(2020, 1, 1) + chrono::Duration::days(days);
            let key = cache_key("k-", d);
            let week: u32 = key["k-".len()..].parse().unwrap();
            prop_assert_eq!(key.len(), 4);
            prop_assert!((1..=53).contains(&week));
        }
    }
}
