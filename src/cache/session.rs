//! Session facade over the cache.
//!
//! One instance per signed-in session, wiring the slot store, the fetch and
//! write adapters, the reconciler, and the status channel. All slot
//! operations are synchronous; the only suspension points are adapter calls.
//! A mutation's cache patch is applied strictly after the server confirms the
//! write and strictly before the status channel is notified, so status
//! consumers always observe the patched cache.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use metrics::histogram;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::application::fetch::{FetchAdapter, FetchError};
use crate::application::pagination::Page;
use crate::application::status::{StatusNote, StatusSink};
use crate::application::write::{ConfirmedMutation, MutationDescriptor, WriteAdapter};
use crate::config::CacheSettings;
use crate::domain::records::{EmployeeSummary, RecordDetail, RecordId};

use super::keys::{CollectionKey, QueryKey};
use super::lock::{rw_read, rw_write};
use super::policy::{SlotClass, StalenessPolicy};
use super::reconciler;
use super::seed;
use super::store::CacheStore;

const SOURCE: &str = "cache::session";

const METRIC_SWEEP_MS: &str = "schedario_cache_sweep_ms";

/// What a subscribed view renders for a key.
///
/// A stale value is not an error: it is shown with a loading indicator while
/// the background refresh runs.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub value: Option<T>,
    pub is_loading: bool,
    pub is_stale: bool,
}

/// Completion guard keyed on a view's lifetime.
///
/// A fetch started on behalf of a view checks the guard after the network
/// call returns; once the view has unmounted, the result is discarded instead
/// of being written to any slot.
#[derive(Debug, Clone, Default)]
pub struct ViewGuard {
    unmounted: Arc<AtomicBool>,
}

impl ViewGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unmount(&self) {
        self.unmounted.store(true, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        !self.unmounted.load(Ordering::Acquire)
    }
}

/// Keeps a slot's consumer count up while a view displays it; the idle sweep
/// only drops slots with no subscribers.
pub struct SubscriptionGuard {
    store: Arc<CacheStore>,
    key: QueryKey,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.store.remove_subscriber(&self.key);
    }
}

/// Process-wide cache session: created at sign-in, cleared at logout.
pub struct CacheSession {
    store: Arc<CacheStore>,
    policy: StalenessPolicy,
    fetcher: Arc<dyn FetchAdapter>,
    writer: Arc<dyn WriteAdapter>,
    status: Arc<dyn StatusSink>,
    inflight: Arc<RwLock<HashSet<QueryKey>>>,
}

impl CacheSession {
    pub fn new(
        store: Arc<CacheStore>,
        policy: StalenessPolicy,
        fetcher: Arc<dyn FetchAdapter>,
        writer: Arc<dyn WriteAdapter>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            store,
            policy,
            fetcher,
            writer,
            status,
            inflight: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Build a session around a fresh store sized and tuned from settings.
    pub fn from_settings(
        settings: &CacheSettings,
        fetcher: Arc<dyn FetchAdapter>,
        writer: Arc<dyn WriteAdapter>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self::new(
            Arc::new(CacheStore::new(settings.store_limits())),
            StalenessPolicy::from_settings(settings),
            fetcher,
            writer,
            status,
        )
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// A collection page: cached when fresh, refetched when invalidated or
    /// absent. A value past its staleness horizon is returned as-is while a
    /// background refresh runs.
    pub async fn collection(
        &self,
        key: &CollectionKey,
    ) -> Result<Page<EmployeeSummary>, FetchError> {
        self.collection_scoped(key, None).await
    }

    /// As [`collection`](Self::collection), discarding the result of any
    /// network fetch once `view` has unmounted.
    pub async fn collection_for_view(
        &self,
        key: &CollectionKey,
        view: &ViewGuard,
    ) -> Result<Page<EmployeeSummary>, FetchError> {
        self.collection_scoped(key, Some(view)).await
    }

    async fn collection_scoped(
        &self,
        key: &CollectionKey,
        view: Option<&ViewGuard>,
    ) -> Result<Page<EmployeeSummary>, FetchError> {
        if let Some(read) = self.store.get_collection(key)
            && !read.invalidated
        {
            let now = OffsetDateTime::now_utc();
            if !self.policy.is_stale(SlotClass::Collection, read.fetched_at, now) {
                return Ok(read.value);
            }
            debug!(page = key.page(), "Stale collection read; refreshing in background");
            self.spawn_collection_refresh(key.clone());
            return Ok(read.value);
        }
        self.fetch_collection_now(key, view).await
    }

    /// A record detail: cached when fresh (possibly partial, when seeded),
    /// refetched when invalidated or absent.
    pub async fn detail(&self, id: &RecordId) -> Result<RecordDetail, FetchError> {
        self.detail_scoped(id, None).await
    }

    /// As [`detail`](Self::detail), discarding the result of any network
    /// fetch once `view` has unmounted.
    pub async fn detail_for_view(
        &self,
        id: &RecordId,
        view: &ViewGuard,
    ) -> Result<RecordDetail, FetchError> {
        self.detail_scoped(id, Some(view)).await
    }

    async fn detail_scoped(
        &self,
        id: &RecordId,
        view: Option<&ViewGuard>,
    ) -> Result<RecordDetail, FetchError> {
        if let Some(read) = self.store.get_detail(id)
            && !read.invalidated
        {
            let now = OffsetDateTime::now_utc();
            if !self.policy.is_stale(SlotClass::Detail, read.fetched_at, now) {
                return Ok(read.value);
            }
            debug!(record_id = %id, "Stale detail read; refreshing in background");
            self.spawn_detail_refresh(id.clone());
            return Ok(read.value);
        }
        self.fetch_detail_now(id, view).await
    }

    /// List → detail navigation: seed the detail slot from the collection row
    /// when it is cached, then read the detail without a network round-trip.
    pub async fn open_detail(
        &self,
        id: &RecordId,
        from: Option<&CollectionKey>,
        view: &ViewGuard,
    ) -> Result<RecordDetail, FetchError> {
        if let Some(source) = from {
            seed::seed(&self.store, id, source);
        }
        self.detail_scoped(id, Some(view)).await
    }

    /// Force a fetch for `id`, completing a partial slot.
    pub async fn refresh_detail(&self, id: &RecordId) -> Result<RecordDetail, FetchError> {
        self.fetch_detail_now(id, None).await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Perform a write. On confirmation the cache is reconciled before the
    /// status channel hears about it; on failure no slot is touched and the
    /// caller rolls back any optimistic UI state.
    ///
    /// Concurrent writes against one entity are serialized by the UI
    /// (the triggering control is disabled while one is in flight); there is
    /// no last-write-wins arbitration here.
    pub async fn mutate(
        &self,
        descriptor: MutationDescriptor,
    ) -> Result<ConfirmedMutation, FetchError> {
        let action = descriptor.describe();
        match self.writer.write(descriptor).await {
            Ok(confirmed) => {
                let outcome = reconciler::apply(&self.store, &confirmed);
                debug!(action, outcome = %outcome, "Mutation reconciled");
                self.status.notify(StatusNote::success(confirmed.describe()));
                Ok(confirmed)
            }
            Err(error) => {
                warn!(action, status = error.status, "Mutation failed");
                self.status
                    .notify(StatusNote::failure(format!("could not {action}: {}", error.message)));
                Err(error)
            }
        }
    }

    // ========================================================================
    // View boundary
    // ========================================================================

    pub fn subscribe(&self, key: QueryKey) -> SubscriptionGuard {
        self.store.add_subscriber(key.clone());
        SubscriptionGuard {
            store: Arc::clone(&self.store),
            key,
        }
    }

    pub fn collection_snapshot(&self, key: &CollectionKey) -> QuerySnapshot<Page<EmployeeSummary>> {
        let is_loading = self.is_inflight(&QueryKey::Collection(key.clone()));
        match self.store.get_collection(key) {
            Some(read) => {
                let now = OffsetDateTime::now_utc();
                QuerySnapshot {
                    is_stale: read.invalidated
                        || self.policy.is_stale(SlotClass::Collection, read.fetched_at, now),
                    value: Some(read.value),
                    is_loading,
                }
            }
            None => QuerySnapshot {
                value: None,
                is_loading,
                is_stale: false,
            },
        }
    }

    pub fn detail_snapshot(&self, id: &RecordId) -> QuerySnapshot<RecordDetail> {
        let is_loading = self.is_inflight(&QueryKey::Detail(id.clone()));
        match self.store.get_detail(id) {
            Some(read) => {
                let now = OffsetDateTime::now_utc();
                QuerySnapshot {
                    is_stale: read.invalidated
                        || self.policy.is_stale(SlotClass::Detail, read.fetched_at, now),
                    value: Some(read.value),
                    is_loading,
                }
            }
            None => QuerySnapshot {
                value: None,
                is_loading,
                is_stale: false,
            },
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drop idle, unsubscribed slots. Driven by the host on the configured
    /// cadence.
    pub fn sweep(&self) -> usize {
        let sweep_started_at = Instant::now();
        let evicted = self.store.sweep(&self.policy, OffsetDateTime::now_utc());
        histogram!(METRIC_SWEEP_MS).record(sweep_started_at.elapsed().as_secs_f64() * 1000.0);
        evicted
    }

    /// The logout hook: drop every slot and subscription.
    pub fn clear(&self) {
        self.store.clear();
        info!("Session cache cleared");
    }

    // ========================================================================
    // Fetch plumbing
    // ========================================================================

    async fn fetch_collection_now(
        &self,
        key: &CollectionKey,
        view: Option<&ViewGuard>,
    ) -> Result<Page<EmployeeSummary>, FetchError> {
        let query_key = QueryKey::Collection(key.clone());
        let owns_marker = self.begin_inflight(query_key.clone());
        let result = self.fetcher.fetch_collection(key).await;
        if owns_marker {
            self.end_inflight(&query_key);
        }

        match result {
            Ok(page) => {
                if view.is_none_or(ViewGuard::is_active) {
                    self.store.set_collection(key.clone(), page.clone());
                } else {
                    debug!(page = key.page(), "View unmounted; fetched collection not cached");
                }
                Ok(page)
            }
            Err(error) => {
                self.status
                    .notify(StatusNote::failure(format!("could not load records: {}", error.message)));
                Err(error)
            }
        }
    }

    async fn fetch_detail_now(
        &self,
        id: &RecordId,
        view: Option<&ViewGuard>,
    ) -> Result<RecordDetail, FetchError> {
        let query_key = QueryKey::Detail(id.clone());
        let owns_marker = self.begin_inflight(query_key.clone());
        let result = self.fetcher.fetch_detail(id).await;
        if owns_marker {
            self.end_inflight(&query_key);
        }

        match result {
            Ok(record) => {
                let detail = RecordDetail::from_record(record);
                if view.is_none_or(ViewGuard::is_active) {
                    self.store.set_detail(id.clone(), detail.clone());
                } else {
                    debug!(record_id = %id, "View unmounted; fetched detail not cached");
                }
                Ok(detail)
            }
            Err(error) => {
                self.status.notify(StatusNote::failure(format!(
                    "could not load record {id}: {}",
                    error.message
                )));
                Err(error)
            }
        }
    }

    fn spawn_collection_refresh(&self, key: CollectionKey) {
        let query_key = QueryKey::Collection(key.clone());
        if !self.begin_inflight(query_key.clone()) {
            return;
        }
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let status = Arc::clone(&self.status);
        let inflight = Arc::clone(&self.inflight);
        tokio::spawn(async move {
            let result = fetcher.fetch_collection(&key).await;
            rw_write(&inflight, SOURCE, "refresh.end").remove(&query_key);
            match result {
                Ok(page) => store.set_collection(key, page),
                Err(error) => {
                    warn!(status = error.status, "Background collection refresh failed");
                    status.notify(StatusNote::failure(format!(
                        "could not refresh records: {}",
                        error.message
                    )));
                }
            }
        });
    }

    fn spawn_detail_refresh(&self, id: RecordId) {
        let query_key = QueryKey::Detail(id.clone());
        if !self.begin_inflight(query_key.clone()) {
            return;
        }
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let status = Arc::clone(&self.status);
        let inflight = Arc::clone(&self.inflight);
        tokio::spawn(async move {
            let result = fetcher.fetch_detail(&id).await;
            rw_write(&inflight, SOURCE, "refresh.end").remove(&query_key);
            match result {
                Ok(record) => store.set_detail(id, RecordDetail::from_record(record)),
                Err(error) => {
                    warn!(record_id = %id, status = error.status, "Background detail refresh failed");
                    status.notify(StatusNote::failure(format!(
                        "could not refresh record {id}: {}",
                        error.message
                    )));
                }
            }
        });
    }

    fn begin_inflight(&self, key: QueryKey) -> bool {
        rw_write(&self.inflight, SOURCE, "begin_inflight").insert(key)
    }

    fn end_inflight(&self, key: &QueryKey) {
        rw_write(&self.inflight, SOURCE, "end_inflight").remove(key);
    }

    fn is_inflight(&self, key: &QueryKey) -> bool {
        rw_read(&self.inflight, SOURCE, "is_inflight").contains(key)
    }
}
