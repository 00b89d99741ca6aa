//! Staleness and eviction horizons.
//!
//! Collection slots default to a shorter staleness horizon than detail slots:
//! membership churns faster than a single record's attributes. Invalidation
//! short-circuits both horizons and is tracked on the slot itself.

use time::{Duration, OffsetDateTime};

use crate::config::CacheSettings;

const DEFAULT_DETAIL_STALENESS_MS: u64 = 120_000;
const DEFAULT_COLLECTION_STALENESS_MS: u64 = 30_000;
const DEFAULT_IDLE_EVICTION_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClass {
    Detail,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessPolicy {
    detail_staleness: Duration,
    collection_staleness: Duration,
    idle_eviction: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            detail_staleness: millis(DEFAULT_DETAIL_STALENESS_MS),
            collection_staleness: millis(DEFAULT_COLLECTION_STALENESS_MS),
            idle_eviction: millis(DEFAULT_IDLE_EVICTION_MS),
        }
    }
}

impl StalenessPolicy {
    pub fn new(
        detail_staleness: Duration,
        collection_staleness: Duration,
        idle_eviction: Duration,
    ) -> Self {
        Self {
            detail_staleness,
            collection_staleness,
            idle_eviction,
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            detail_staleness: millis(settings.detail_staleness_ms),
            collection_staleness: millis(settings.collection_staleness_ms),
            idle_eviction: millis(settings.idle_eviction_ms),
        }
    }

    pub fn staleness_for(&self, class: SlotClass) -> Duration {
        match class {
            SlotClass::Detail => self.detail_staleness,
            SlotClass::Collection => self.collection_staleness,
        }
    }

    /// Whether a slot fetched at `fetched_at` is past its staleness horizon.
    pub fn is_stale(&self, class: SlotClass, fetched_at: OffsetDateTime, now: OffsetDateTime) -> bool {
        now - fetched_at >= self.staleness_for(class)
    }

    /// Whether a slot last read at `last_read` is past the idle horizon and
    /// may be dropped once it has no subscribers.
    pub fn is_idle(&self, last_read: OffsetDateTime, now: OffsetDateTime) -> bool {
        now - last_read >= self.idle_eviction
    }
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn collection_horizon_is_shorter_by_default() {
        let policy = StalenessPolicy::default();
        assert!(
            policy.staleness_for(SlotClass::Collection) < policy.staleness_for(SlotClass::Detail)
        );
    }

    #[test]
    fn staleness_is_per_class() {
        let policy = StalenessPolicy::new(
            Duration::seconds(120),
            Duration::seconds(30),
            Duration::seconds(600),
        );
        let fetched_at = datetime!(2025-06-01 08:00 UTC);
        let now = fetched_at + Duration::seconds(60);

        assert!(policy.is_stale(SlotClass::Collection, fetched_at, now));
        assert!(!policy.is_stale(SlotClass::Detail, fetched_at, now));
    }

    #[test]
    fn idle_horizon_gates_eviction() {
        let policy = StalenessPolicy::default();
        let last_read = datetime!(2025-06-01 08:00 UTC);

        assert!(!policy.is_idle(last_read, last_read + Duration::minutes(5)));
        assert!(policy.is_idle(last_read, last_read + Duration::minutes(15)));
    }
}
