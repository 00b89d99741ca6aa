//! Cache slot storage.
//!
//! Detail and collection slots live in separate LRU-bounded maps. A slot is a
//! value plus its fetched-at time and invalidation flag; patches replace the
//! value atomically under the map's write lock and preserve fetched-at, so a
//! reader always observes a whole pre-patch or post-patch value.
//!
//! The store never fetches. Staleness decisions belong to the policy and the
//! session; the store only records the facts they need.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::RwLock;

use lru::LruCache;
use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::pagination::Page;
use crate::domain::records::{EmployeeSummary, RecordDetail, RecordId};

use super::keys::{CollectionKey, QueryKey};
use super::lock::{rw_read, rw_write};
use super::policy::StalenessPolicy;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_DETAIL_HIT_TOTAL: &str = "schedario_cache_detail_hit_total";
pub(crate) const METRIC_DETAIL_MISS_TOTAL: &str = "schedario_cache_detail_miss_total";
pub(crate) const METRIC_COLLECTION_HIT_TOTAL: &str = "schedario_cache_collection_hit_total";
pub(crate) const METRIC_COLLECTION_MISS_TOTAL: &str = "schedario_cache_collection_miss_total";
pub(crate) const METRIC_EVICT_TOTAL: &str = "schedario_cache_evict_total";

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    fetched_at: OffsetDateTime,
    invalidated: bool,
    last_read: OffsetDateTime,
}

impl<V> Slot<V> {
    fn new(value: V, fetched_at: OffsetDateTime) -> Self {
        Self {
            value,
            fetched_at,
            invalidated: false,
            last_read: fetched_at,
        }
    }

    fn read(&self) -> SlotRead<V>
    where
        V: Clone,
    {
        SlotRead {
            value: self.value.clone(),
            fetched_at: self.fetched_at,
            invalidated: self.invalidated,
        }
    }
}

/// A whole-slot read: the value plus the facts staleness decisions need.
#[derive(Debug, Clone)]
pub struct SlotRead<V> {
    pub value: V,
    pub fetched_at: OffsetDateTime,
    pub invalidated: bool,
}

/// Capacity bounds for the two slot maps.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub detail_slots: NonZeroUsize,
    pub collection_slots: NonZeroUsize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            detail_slots: NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN),
            collection_slots: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// Session-scoped slot store.
///
/// An explicit, constructible instance: created at session start, cleared in
/// full at logout. Tests build isolated instances.
pub struct CacheStore {
    details: RwLock<LruCache<RecordId, Slot<RecordDetail>>>,
    collections: RwLock<LruCache<CollectionKey, Slot<Page<EmployeeSummary>>>>,
    subscribers: RwLock<HashMap<QueryKey, usize>>,
}

impl CacheStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            details: RwLock::new(LruCache::new(limits.detail_slots)),
            collections: RwLock::new(LruCache::new(limits.collection_slots)),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // Detail slots
    // ========================================================================

    /// Current detail value, or absent. Never triggers a fetch.
    pub fn get_detail(&self, id: &RecordId) -> Option<SlotRead<RecordDetail>> {
        let mut details = rw_write(&self.details, SOURCE, "get_detail");
        match details.get_mut(id) {
            Some(slot) => {
                slot.last_read = OffsetDateTime::now_utc();
                counter!(METRIC_DETAIL_HIT_TOTAL).increment(1);
                Some(slot.read())
            }
            None => {
                counter!(METRIC_DETAIL_MISS_TOTAL).increment(1);
                None
            }
        }
    }

    /// Read a detail slot without touching recency or hit counters.
    pub fn peek_detail(&self, id: &RecordId) -> Option<SlotRead<RecordDetail>> {
        rw_read(&self.details, SOURCE, "peek_detail")
            .peek(id)
            .map(Slot::read)
    }

    /// Replace the detail slot, recording the fetch time as now.
    pub fn set_detail(&self, id: RecordId, value: RecordDetail) {
        self.set_detail_fetched_at(id, value, OffsetDateTime::now_utc());
    }

    /// Replace the detail slot with an explicit fetch time.
    ///
    /// Seeding uses this to carry over the source collection's fetch time, so
    /// a seeded slot never claims to be fresher than the row it came from.
    pub fn set_detail_fetched_at(
        &self,
        id: RecordId,
        value: RecordDetail,
        fetched_at: OffsetDateTime,
    ) {
        let mut details = rw_write(&self.details, SOURCE, "set_detail");
        if let Some((evicted, _)) = details.push(id.clone(), Slot::new(value, fetched_at))
            && evicted != id
        {
            counter!(METRIC_EVICT_TOTAL, "class" => "detail").increment(1);
            debug!(record_id = %evicted, "Detail slot evicted at capacity");
        }
    }

    /// Atomically replace the detail value with `updater(value)`, preserving
    /// fetched-at. No-op when the slot is absent; returns whether it applied.
    pub fn patch_detail(&self, id: &RecordId, updater: impl FnOnce(&mut RecordDetail)) -> bool {
        let mut details = rw_write(&self.details, SOURCE, "patch_detail");
        match details.peek_mut(id) {
            Some(slot) => {
                updater(&mut slot.value);
                true
            }
            None => false,
        }
    }

    /// Force a refetch on the next detail read, regardless of elapsed time.
    pub fn invalidate_detail(&self, id: &RecordId) -> bool {
        let mut details = rw_write(&self.details, SOURCE, "invalidate_detail");
        match details.peek_mut(id) {
            Some(slot) => {
                slot.invalidated = true;
                true
            }
            None => false,
        }
    }

    pub fn evict_detail(&self, id: &RecordId) -> bool {
        rw_write(&self.details, SOURCE, "evict_detail")
            .pop(id)
            .is_some()
    }

    // ========================================================================
    // Collection slots
    // ========================================================================

    /// Current collection page, or absent. Never triggers a fetch.
    pub fn get_collection(&self, key: &CollectionKey) -> Option<SlotRead<Page<EmployeeSummary>>> {
        let mut collections = rw_write(&self.collections, SOURCE, "get_collection");
        match collections.get_mut(key) {
            Some(slot) => {
                slot.last_read = OffsetDateTime::now_utc();
                counter!(METRIC_COLLECTION_HIT_TOTAL).increment(1);
                Some(slot.read())
            }
            None => {
                counter!(METRIC_COLLECTION_MISS_TOTAL).increment(1);
                None
            }
        }
    }

    /// Read a collection slot without touching recency or hit counters.
    pub fn peek_collection(&self, key: &CollectionKey) -> Option<SlotRead<Page<EmployeeSummary>>> {
        rw_read(&self.collections, SOURCE, "peek_collection")
            .peek(key)
            .map(Slot::read)
    }

    pub fn set_collection(&self, key: CollectionKey, value: Page<EmployeeSummary>) {
        let mut collections = rw_write(&self.collections, SOURCE, "set_collection");
        let slot = Slot::new(value, OffsetDateTime::now_utc());
        if let Some((evicted, _)) = collections.push(key.clone(), slot)
            && evicted != key
        {
            counter!(METRIC_EVICT_TOTAL, "class" => "collection").increment(1);
            debug!(page = evicted.page(), "Collection slot evicted at capacity");
        }
    }

    /// Atomically replace the page with `updater(page)`, preserving
    /// fetched-at. No-op when the slot is absent; returns whether it applied.
    pub fn patch_collection(
        &self,
        key: &CollectionKey,
        updater: impl FnOnce(&mut Page<EmployeeSummary>),
    ) -> bool {
        let mut collections = rw_write(&self.collections, SOURCE, "patch_collection");
        match collections.peek_mut(key) {
            Some(slot) => {
                updater(&mut slot.value);
                true
            }
            None => false,
        }
    }

    /// Force a refetch on the next read of this page.
    pub fn invalidate_collection(&self, key: &CollectionKey) -> bool {
        let mut collections = rw_write(&self.collections, SOURCE, "invalidate_collection");
        match collections.peek_mut(key) {
            Some(slot) => {
                slot.invalidated = true;
                true
            }
            None => false,
        }
    }

    pub fn evict_collection(&self, key: &CollectionKey) -> bool {
        rw_write(&self.collections, SOURCE, "evict_collection")
            .pop(key)
            .is_some()
    }

    /// Every collection key currently cached, for reconciliation walks.
    pub fn collection_keys(&self) -> Vec<CollectionKey> {
        rw_read(&self.collections, SOURCE, "collection_keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    // ========================================================================
    // Unified-key operations
    // ========================================================================

    pub fn invalidate(&self, key: &QueryKey) -> bool {
        match key {
            QueryKey::Detail(id) => self.invalidate_detail(id),
            QueryKey::Collection(key) => self.invalidate_collection(key),
        }
    }

    pub fn evict(&self, key: &QueryKey) -> bool {
        match key {
            QueryKey::Detail(id) => self.evict_detail(id),
            QueryKey::Collection(key) => self.evict_collection(key),
        }
    }

    // ========================================================================
    // Subscribers and lifecycle
    // ========================================================================

    pub(crate) fn add_subscriber(&self, key: QueryKey) {
        let mut subscribers = rw_write(&self.subscribers, SOURCE, "add_subscriber");
        *subscribers.entry(key).or_insert(0) += 1;
    }

    pub(crate) fn remove_subscriber(&self, key: &QueryKey) {
        let mut subscribers = rw_write(&self.subscribers, SOURCE, "remove_subscriber");
        if let Some(count) = subscribers.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                subscribers.remove(key);
            }
        }
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        rw_read(&self.subscribers, SOURCE, "subscriber_count")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Drop slots past the idle horizon that no view subscribes to.
    /// Returns the number of slots evicted.
    pub fn sweep(&self, policy: &StalenessPolicy, now: OffsetDateTime) -> usize {
        let mut evicted = 0;

        let idle_details: Vec<RecordId> = {
            let details = rw_read(&self.details, SOURCE, "sweep.scan_details");
            details
                .iter()
                .filter(|(id, slot)| {
                    policy.is_idle(slot.last_read, now)
                        && self.subscriber_count(&QueryKey::Detail((*id).clone())) == 0
                })
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in idle_details {
            if self.evict_detail(&id) {
                evicted += 1;
            }
        }

        let idle_collections: Vec<CollectionKey> = {
            let collections = rw_read(&self.collections, SOURCE, "sweep.scan_collections");
            collections
                .iter()
                .filter(|(key, slot)| {
                    policy.is_idle(slot.last_read, now)
                        && self.subscriber_count(&QueryKey::Collection((*key).clone())) == 0
                })
                .map(|(key, _)| key.clone())
                .collect()
        };
        for key in idle_collections {
            if self.evict_collection(&key) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(evicted, "Idle slots swept");
        }
        evicted
    }

    /// Drop everything. The logout hook.
    pub fn clear(&self) {
        rw_write(&self.details, SOURCE, "clear.details").clear();
        rw_write(&self.collections, SOURCE, "clear.collections").clear();
        rw_write(&self.subscribers, SOURCE, "clear.subscribers").clear();
    }

    pub fn detail_len(&self) -> usize {
        rw_read(&self.details, SOURCE, "detail_len").len()
    }

    pub fn collection_len(&self) -> usize {
        rw_read(&self.collections, SOURCE, "collection_len").len()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use time::macros::datetime;

    use crate::domain::types::EmploymentCategory;

    use super::*;

    fn record_id(raw: &str) -> RecordId {
        RecordId::new(raw).expect("valid id")
    }

    fn sample_detail(id: &str) -> RecordDetail {
        RecordDetail {
            id: record_id(id),
            surname: "CRUZ".to_string(),
            given_name: "Maria".to_string(),
            category: EmploymentCategory::Permanent,
            active: true,
            updated_at: datetime!(2025-06-01 08:00 UTC),
            profile: None,
            attachments: Some(Vec::new()),
        }
    }

    fn sample_page(ids: &[&str]) -> Page<EmployeeSummary> {
        let items = ids
            .iter()
            .map(|id| EmployeeSummary {
                id: record_id(id),
                surname: "CRUZ".to_string(),
                given_name: "Maria".to_string(),
                category: EmploymentCategory::Permanent,
                active: true,
                updated_at: datetime!(2025-06-01 08:00 UTC),
            })
            .collect::<Vec<_>>();
        let total = items.len() as u64;
        Page::new(items, 1, 20, total)
    }

    fn collection_key(page: u32) -> CollectionKey {
        CollectionKey::builder()
            .active(true)
            .page(page)
            .page_size(20)
            .build()
            .expect("valid key")
    }

    #[test]
    fn detail_slot_round_trip() {
        let store = CacheStore::default();
        let id = record_id("E010");

        assert!(store.get_detail(&id).is_none());

        store.set_detail(id.clone(), sample_detail("E010"));
        let read = store.get_detail(&id).expect("cached detail");
        assert_eq!(read.value.id, id);
        assert!(!read.invalidated);

        assert!(store.evict_detail(&id));
        assert!(store.get_detail(&id).is_none());
    }

    #[test]
    fn patch_preserves_fetched_at_and_is_atomic_per_slot() {
        let store = CacheStore::default();
        let id = record_id("E010");
        store.set_detail(id.clone(), sample_detail("E010"));

        let before = store.peek_detail(&id).expect("cached").fetched_at;
        assert!(store.patch_detail(&id, |detail| detail.active = false));

        let read = store.peek_detail(&id).expect("cached");
        assert_eq!(read.fetched_at, before);
        assert!(!read.value.active);
    }

    #[test]
    fn patch_on_absent_slot_is_a_no_op() {
        let store = CacheStore::default();
        assert!(!store.patch_detail(&record_id("E404"), |detail| detail.active = false));
    }

    #[test]
    fn invalidate_flags_without_dropping_the_value() {
        let store = CacheStore::default();
        let key = collection_key(1);
        store.set_collection(key.clone(), sample_page(&["E010"]));

        assert!(store.invalidate_collection(&key));
        let read = store.get_collection(&key).expect("still cached");
        assert!(read.invalidated);
        assert_eq!(read.value.items.len(), 1);
    }

    #[test]
    fn unified_key_dispatch() {
        let store = CacheStore::default();
        let id = record_id("E010");
        let key = collection_key(1);
        store.set_detail(id.clone(), sample_detail("E010"));
        store.set_collection(key.clone(), sample_page(&["E010"]));

        assert!(store.invalidate(&QueryKey::Detail(id.clone())));
        assert!(store.evict(&QueryKey::Collection(key.clone())));
        assert!(store.peek_detail(&id).expect("cached").invalidated);
        assert!(store.peek_collection(&key).is_none());
    }

    #[test]
    fn capacity_eviction_drops_least_recent() {
        let limits = StoreLimits {
            detail_slots: NonZeroUsize::new(2).expect("non-zero"),
            collection_slots: NonZeroUsize::MIN,
        };
        let store = CacheStore::new(limits);

        store.set_detail(record_id("E001"), sample_detail("E001"));
        store.set_detail(record_id("E002"), sample_detail("E002"));
        store.set_detail(record_id("E003"), sample_detail("E003"));

        assert!(store.peek_detail(&record_id("E001")).is_none());
        assert!(store.peek_detail(&record_id("E002")).is_some());
        assert!(store.peek_detail(&record_id("E003")).is_some());
    }

    #[test]
    fn sweep_spares_subscribed_and_recent_slots() {
        let store = CacheStore::default();
        let policy = StalenessPolicy::default();
        let kept_id = record_id("E010");
        let dropped_id = record_id("E011");
        store.set_detail(kept_id.clone(), sample_detail("E010"));
        store.set_detail(dropped_id.clone(), sample_detail("E011"));

        store.add_subscriber(QueryKey::Detail(kept_id.clone()));

        let later = OffsetDateTime::now_utc() + Duration::hours(1);
        let evicted = store.sweep(&policy, later);

        assert_eq!(evicted, 1);
        assert!(store.peek_detail(&kept_id).is_some());
        assert!(store.peek_detail(&dropped_id).is_none());

        store.remove_subscriber(&QueryKey::Detail(kept_id.clone()));
        assert_eq!(store.sweep(&policy, later), 1);
        assert!(store.peek_detail(&kept_id).is_none());
    }

    #[test]
    fn sweep_keeps_recently_read_slots() {
        let store = CacheStore::default();
        let policy = StalenessPolicy::default();
        store.set_detail(record_id("E010"), sample_detail("E010"));

        assert_eq!(store.sweep(&policy, OffsetDateTime::now_utc()), 0);
        assert_eq!(store.detail_len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let store = CacheStore::default();
        store.set_detail(record_id("E010"), sample_detail("E010"));
        store.set_collection(collection_key(1), sample_page(&["E010"]));
        store.add_subscriber(QueryKey::Detail(record_id("E010")));

        store.clear();

        assert_eq!(store.detail_len(), 0);
        assert_eq!(store.collection_len(), 0);
        assert_eq!(store.subscriber_count(&QueryKey::Detail(record_id("E010"))), 0);
    }
}
