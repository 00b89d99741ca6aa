//! Prefetch bridge: populate a detail slot from a collection row that is
//! already cached, so list → detail navigation never refetches.

use tracing::debug;

use crate::domain::records::{EmployeeSummary, RecordDetail, RecordId};

use super::keys::CollectionKey;
use super::store::CacheStore;

/// Seed the detail slot of the first row in `source` matching `matcher`.
///
/// The seeded value is partial (profile and attachments not yet loaded) and
/// inherits the source page's fetch time. No-op — returning false — when the
/// source page is absent or invalidated, no row matches, or the detail slot
/// already holds a complete, non-invalidated value that a partial seed must
/// not clobber.
pub fn seed_with(
    store: &CacheStore,
    source: &CollectionKey,
    matcher: impl Fn(&EmployeeSummary) -> bool,
) -> bool {
    let Some(page) = store.peek_collection(source) else {
        return false;
    };
    if page.invalidated {
        return false;
    }
    let Some(row) = page.value.items.iter().find(|row| matcher(row)) else {
        return false;
    };
    if let Some(existing) = store.peek_detail(&row.id)
        && existing.value.is_complete()
        && !existing.invalidated
    {
        return false;
    }

    store.set_detail_fetched_at(row.id.clone(), RecordDetail::from_summary(row), page.fetched_at);
    debug!(record_id = %row.id, source_page = source.page(), "Detail slot seeded from collection row");
    true
}

/// Seed the detail slot for `id` from `source`, matching by record id.
pub fn seed(store: &CacheStore, id: &RecordId, source: &CollectionKey) -> bool {
    seed_with(store, source, |row| &row.id == id)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::application::pagination::Page;
    use crate::domain::records::RecordProfile;
    use crate::domain::types::EmploymentCategory;

    use super::*;

    fn record_id(raw: &str) -> RecordId {
        RecordId::new(raw).expect("valid id")
    }

    fn summary(id: &str) -> EmployeeSummary {
        EmployeeSummary {
            id: record_id(id),
            surname: "CRUZ".to_string(),
            given_name: "Maria".to_string(),
            category: EmploymentCategory::Permanent,
            active: true,
            updated_at: datetime!(2025-06-01 08:00 UTC),
        }
    }

    fn cached_page(store: &CacheStore, ids: &[&str]) -> CollectionKey {
        let key = CollectionKey::builder()
            .active(true)
            .page(1)
            .page_size(20)
            .build()
            .expect("valid key");
        let items: Vec<_> = ids.iter().map(|id| summary(id)).collect();
        let total = items.len() as u64;
        store.set_collection(key.clone(), Page::new(items, 1, 20, total));
        key
    }

    #[test]
    fn seeds_partial_detail_with_source_fetch_time() {
        let store = CacheStore::default();
        let key = cached_page(&store, &["E010", "E011"]);
        let source_fetched_at = store.peek_collection(&key).expect("cached").fetched_at;

        assert!(seed(&store, &record_id("E010"), &key));

        let detail = store.peek_detail(&record_id("E010")).expect("seeded");
        assert!(!detail.value.is_complete());
        assert_eq!(detail.value.surname, "CRUZ");
        assert_eq!(detail.fetched_at, source_fetched_at);
    }

    #[test]
    fn missing_row_or_page_is_a_no_op() {
        let store = CacheStore::default();
        let key = cached_page(&store, &["E010"]);

        assert!(!seed(&store, &record_id("E099"), &key));
        assert!(!seed(&store, &record_id("E010"), &key.at_page(2)));
        assert!(store.peek_detail(&record_id("E099")).is_none());
    }

    #[test]
    fn invalidated_source_is_not_seeded_from() {
        let store = CacheStore::default();
        let key = cached_page(&store, &["E010"]);
        store.invalidate_collection(&key);

        assert!(!seed(&store, &record_id("E010"), &key));
    }

    #[test]
    fn complete_detail_is_not_clobbered() {
        let store = CacheStore::default();
        let key = cached_page(&store, &["E010"]);

        let mut complete = RecordDetail::from_summary(&summary("E010"));
        complete.profile = Some(RecordProfile {
            email: "maria.cruz@example.test".to_string(),
            phone: None,
            position: "Clerk".to_string(),
            hired_on: time::macros::date!(2019 - 03 - 18),
            notes: None,
        });
        complete.attachments = Some(Vec::new());
        store.set_detail(record_id("E010"), complete.clone());

        assert!(!seed(&store, &record_id("E010"), &key));
        let kept = store.peek_detail(&record_id("E010")).expect("cached");
        assert_eq!(kept.value, complete);
    }

    #[test]
    fn invalidated_detail_is_reseeded() {
        let store = CacheStore::default();
        let key = cached_page(&store, &["E010"]);
        assert!(seed(&store, &record_id("E010"), &key));
        store.invalidate_detail(&record_id("E010"));

        assert!(seed(&store, &record_id("E010"), &key));
        let detail = store.peek_detail(&record_id("E010")).expect("seeded");
        assert!(!detail.invalidated);
    }

    #[test]
    fn matcher_variant_selects_by_predicate() {
        let store = CacheStore::default();
        let key = cached_page(&store, &["E010", "E011"]);

        assert!(seed_with(&store, &key, |row| row.id.as_str() == "E011"));
        assert!(store.peek_detail(&record_id("E011")).is_some());
        assert!(store.peek_detail(&record_id("E010")).is_none());
    }
}
