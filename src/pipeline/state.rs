//! Last-seen amounts per (service, period), used for differential emission.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::record::{CostReading, format_period};

/// Scopes differential comparisons to one service in one reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub service: String,
    pub period_start: DateTime<Utc>,
}

impl CacheKey {
    pub fn new(service: impl Into<String>, period_start: DateTime<Utc>) -> Self {
        Self {
            service: service.into(),
            period_start,
        }
    }

    pub fn for_reading(reading: &CostReading) -> Self {
        Self::new(reading.service.clone(), reading.period_start)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.service, format_period(&self.period_start))
    }
}

/// In-memory map of the last absolute amount observed per key.
///
/// Nothing is persisted: after a restart (or [`clear`](Self::clear)) the first
/// reading of every key is compared against zero and re-emitted in full.
#[derive(Debug, Default)]
pub struct DifferentialStore {
    amounts: DashMap<CacheKey, Decimal>,
}

impl DifferentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded amount, or zero for an unseen key.
    pub fn previous(&self, key: &CacheKey) -> Decimal {
        self.amounts
            .get(key)
            .map(|v| *v)
            .unwrap_or(Decimal::ZERO)
    }

    /// Overwrites the stored amount for `key`.
    pub fn record(&self, key: CacheKey, amount: Decimal) {
        self.amounts.insert(key, amount);
    }

    /// Drops entries whose period started before `cutoff`. Returns how many
    /// were removed.
    pub fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.amounts.len();
        self.amounts.retain(|key, _| key.period_start >= cutoff);
        before - self.amounts.len()
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn clear(&self) {
        self.amounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use crate::pipeline::record::midnight_utc;

    fn key(service: &str, date: &str) -> CacheKey {
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        CacheKey::new(service, midnight_utc(day))
    }

    #[test]
    fn test_unseen_key_is_zero() {
        let store = DifferentialStore::new();
        assert_eq!(store.previous(&key("Amazon EC2", "2024-11-27")), Decimal::ZERO);
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_overwrites() {
        let store = DifferentialStore::new();
        let k = key("Amazon EC2", "2024-11-27");

        store.record(k.clone(), dec!(10.50));
        store.record(k.clone(), dec!(9.00));

        assert_eq!(store.previous(&k), dec!(9.00));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_periods_do_not_bleed() {
        let store = DifferentialStore::new();
        store.record(key("Amazon EC2", "2024-11-26"), dec!(40));
        store.record(key("Amazon EC2", "2024-11-27"), dec!(3));

        assert_eq!(store.previous(&key("Amazon EC2", "2024-11-26")), dec!(40));
        assert_eq!(store.previous(&key("Amazon EC2", "2024-11-27")), dec!(3));
        assert_eq!(store.previous(&key("Amazon S3", "2024-11-27")), Decimal::ZERO);
    }

    #[test]
    fn test_evict_before() {
        let store = DifferentialStore::new();
        store.record(key("Amazon EC2", "2024-11-25"), dec!(1));
        store.record(key("Amazon EC2", "2024-11-26"), dec!(2));
        store.record(key("Amazon S3", "2024-11-27"), dec!(3));

        let cutoff = key("", "2024-11-26").period_start;
        assert_eq!(store.evict_before(cutoff), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.previous(&key("Amazon EC2", "2024-11-25")), Decimal::ZERO);
        assert_eq!(store.previous(&key("Amazon EC2", "2024-11-26")), dec!(2));
    }

    #[test]
    fn test_clear_resets_history() {
        let store = DifferentialStore::new();
        let k = key("Amazon EC2", "2024-11-27");
        store.record(k.clone(), dec!(5.00));
        store.clear();
        assert_eq!(store.previous(&k), Decimal::ZERO);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            key("Amazon S3", "2024-11-27").to_string(),
            "Amazon S3-2024-11-27"
        );
    }
}
