//! Confirmed-mutation reconciliation.
//!
//! Applies a server-confirmed write to every affected slot — the record's
//! detail slot and any collection slot whose filter the record matches —
//! without disturbing unrelated slots. Membership that cannot be computed
//! client-side is never guessed: the slot is invalidated instead, because a
//! wrong guess silently hides or duplicates rows.
//!
//! Only confirmed results arrive here. A failed write never reaches the
//! reconciler, so a failure leaves every slot byte-for-byte untouched.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use metrics::histogram;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::write::ConfirmedMutation;
use crate::domain::attachments::{self, AttachmentRecord};
use crate::domain::records::{
    CollectionFilter, EmployeeRecord, EmployeeSummary, FilterMatch, RecordDetail, RecordId,
};

use super::keys::CollectionKey;
use super::store::CacheStore;

const METRIC_RECONCILE_MS: &str = "schedario_cache_reconcile_ms";

/// Slot-level effects of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub details_patched: usize,
    pub details_invalidated: usize,
    pub details_evicted: usize,
    pub collections_patched: usize,
    pub collections_invalidated: usize,
    /// An attachment result could not be matched to any cached entry and the
    /// detail slot was invalidated as the safe fallback.
    pub ambiguous: bool,
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReconcileOutcome {{ details: {}p/{}i/{}e, collections: {}p/{}i, ambiguous: {} }}",
            self.details_patched,
            self.details_invalidated,
            self.details_evicted,
            self.collections_patched,
            self.collections_invalidated,
            self.ambiguous,
        )
    }
}

/// Reconciliation faults. Both are recovered inside [`apply`] by invalidating
/// the affected detail slot; they never escape to view code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("attachment result for record {record_id} matches no cached entry by id or kind")]
    AmbiguousAttachment { record_id: RecordId },
    #[error("attachment sequence for record {record_id} is not loaded")]
    AttachmentsNotLoaded { record_id: RecordId },
}

/// Apply a confirmed mutation to every affected slot.
pub fn apply(store: &CacheStore, confirmed: &ConfirmedMutation) -> ReconcileOutcome {
    let started_at = Instant::now();
    let mut outcome = ReconcileOutcome::default();

    match confirmed {
        ConfirmedMutation::Created { record } => {
            apply_upsert(store, record, UpsertKind::Create, &mut outcome);
        }
        ConfirmedMutation::Updated { record } => {
            apply_upsert(store, record, UpsertKind::Update, &mut outcome);
        }
        ConfirmedMutation::StatusToggled { record } => {
            apply_upsert(store, record, UpsertKind::Toggle, &mut outcome);
        }
        ConfirmedMutation::Deleted { id } => {
            apply_delete(store, id, &mut outcome);
        }
        ConfirmedMutation::AttachmentAdded {
            record_id,
            attachment,
        } => {
            apply_attachment(store, record_id, AttachmentChange::Add(attachment), &mut outcome);
        }
        ConfirmedMutation::AttachmentUpdated {
            record_id,
            attachment,
        } => {
            apply_attachment(
                store,
                record_id,
                AttachmentChange::Update(attachment),
                &mut outcome,
            );
        }
        ConfirmedMutation::AttachmentDeleted {
            record_id,
            attachment_id,
        } => {
            apply_attachment(
                store,
                record_id,
                AttachmentChange::Delete(*attachment_id),
                &mut outcome,
            );
        }
    }

    info!(outcome = %outcome, "Reconciliation applied");
    histogram!(METRIC_RECONCILE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
    outcome
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertKind {
    Create,
    Update,
    Toggle,
}

enum AttachmentChange<'a> {
    Add(&'a AttachmentRecord),
    Update(&'a AttachmentRecord),
    Delete(Uuid),
}

fn apply_upsert(
    store: &CacheStore,
    record: &EmployeeRecord,
    kind: UpsertKind,
    outcome: &mut ReconcileOutcome,
) {
    // Prior membership must be judged against the pre-patch snapshot.
    let prior = store.peek_detail(&record.id).map(|read| read.value.summary());
    let summary = record.summary();

    match kind {
        UpsertKind::Create => {
            store.set_detail(record.id.clone(), RecordDetail::from_record(record.clone()));
            outcome.details_patched += 1;
        }
        UpsertKind::Update | UpsertKind::Toggle => {
            let patched = store.patch_detail(&record.id, |detail| {
                *detail = RecordDetail::from_record(record.clone());
            });
            if patched {
                outcome.details_patched += 1;
            }
        }
    }

    for ((filter, _), keys) in collection_groups(store) {
        match filter.evaluate(&summary) {
            FilterMatch::Indeterminate => invalidate_group(store, &keys, outcome),
            FilterMatch::Matches => match kind {
                UpsertKind::Create => insert_created_row(store, &keys, &summary, outcome),
                UpsertKind::Update | UpsertKind::Toggle => {
                    if !replace_row(store, &keys, &summary, outcome) {
                        // Newly joined this collection; its position in the
                        // ordering is server-side knowledge.
                        invalidate_group(store, &keys, outcome);
                    }
                }
            },
            FilterMatch::Excluded => match kind {
                UpsertKind::Create => {}
                UpsertKind::Update => {
                    if group_contains_row(store, &keys, &record.id) {
                        invalidate_group(store, &keys, outcome);
                    } else if prior_membership_unclear(&filter, prior.as_ref()) {
                        invalidate_group(store, &keys, outcome);
                    }
                }
                UpsertKind::Toggle => {
                    if !remove_row_and_shift(store, &keys, &record.id, outcome)
                        && prior_membership_unclear(&filter, prior.as_ref())
                    {
                        invalidate_group(store, &keys, outcome);
                    }
                }
            },
        }
    }
}

fn apply_delete(store: &CacheStore, id: &RecordId, outcome: &mut ReconcileOutcome) {
    let prior = store.peek_detail(id).map(|read| read.value.summary());
    if store.evict_detail(id) {
        outcome.details_evicted += 1;
    }

    for ((filter, _), keys) in collection_groups(store) {
        // A deleted record is a member of nothing; a visible row always goes.
        if remove_row_and_shift(store, &keys, id, outcome) {
            continue;
        }
        if prior_membership_unclear(&filter, prior.as_ref()) {
            invalidate_group(store, &keys, outcome);
        }
    }
}

fn apply_attachment(
    store: &CacheStore,
    record_id: &RecordId,
    change: AttachmentChange<'_>,
    outcome: &mut ReconcileOutcome,
) {
    enum PatchResult {
        Applied,
        AlreadyAbsent,
        NotLoaded,
        Unmatched,
    }

    let mut result = PatchResult::AlreadyAbsent;
    let slot_present = store.patch_detail(record_id, |detail| {
        let Some(sequence) = detail.attachments.as_mut() else {
            result = PatchResult::NotLoaded;
            return;
        };
        match &change {
            AttachmentChange::Add(attachment) => {
                attachments::upsert_by_kind(sequence, (*attachment).clone());
                result = PatchResult::Applied;
            }
            AttachmentChange::Update(attachment) => {
                let position = sequence
                    .iter()
                    .position(|entry| entry.id == attachment.id)
                    // Some flows target the attachment by kind before its id
                    // is confirmed.
                    .or_else(|| sequence.iter().position(|entry| entry.kind == attachment.kind));
                match position {
                    Some(position) => {
                        sequence[position] = (*attachment).clone();
                        result = PatchResult::Applied;
                    }
                    None => result = PatchResult::Unmatched,
                }
            }
            AttachmentChange::Delete(attachment_id) => {
                let before = sequence.len();
                sequence.retain(|entry| entry.id != *attachment_id);
                result = if sequence.len() < before {
                    PatchResult::Applied
                } else {
                    PatchResult::AlreadyAbsent
                };
            }
        }
    });

    if !slot_present {
        // Nothing cached for this record, so nothing can diverge.
        debug!(record_id = %record_id, "Attachment result for uncached record ignored");
        return;
    }

    match result {
        PatchResult::Applied => outcome.details_patched += 1,
        PatchResult::AlreadyAbsent => {}
        PatchResult::NotLoaded => {
            let error = ReconcileError::AttachmentsNotLoaded {
                record_id: record_id.clone(),
            };
            warn!(error = %error, "Reconciliation ambiguity; invalidating detail slot");
            if store.invalidate_detail(record_id) {
                outcome.details_invalidated += 1;
            }
            outcome.ambiguous = true;
        }
        PatchResult::Unmatched => {
            let error = ReconcileError::AmbiguousAttachment {
                record_id: record_id.clone(),
            };
            warn!(error = %error, "Reconciliation ambiguity; invalidating detail slot");
            if store.invalidate_detail(record_id) {
                outcome.details_invalidated += 1;
            }
            outcome.ambiguous = true;
        }
    }
}

// ============================================================================
// Collection-group helpers
// ============================================================================

/// Cached collection keys grouped into pagination runs: same filter, same
/// page size, ordered by page number.
fn collection_groups(store: &CacheStore) -> HashMap<(CollectionFilter, u32), Vec<CollectionKey>> {
    let mut groups: HashMap<(CollectionFilter, u32), Vec<CollectionKey>> = HashMap::new();
    for key in store.collection_keys() {
        groups
            .entry((key.filter().clone(), key.page_size()))
            .or_default()
            .push(key);
    }
    for keys in groups.values_mut() {
        keys.sort_by_key(CollectionKey::page);
    }
    groups
}

fn invalidate_group(store: &CacheStore, keys: &[CollectionKey], outcome: &mut ReconcileOutcome) {
    for key in keys {
        if store.invalidate_collection(key) {
            outcome.collections_invalidated += 1;
        }
    }
}

fn group_contains_row(store: &CacheStore, keys: &[CollectionKey], id: &RecordId) -> bool {
    keys.iter().any(|key| {
        store
            .peek_collection(key)
            .is_some_and(|read| read.value.items.iter().any(|row| &row.id == id))
    })
}

/// Replace the row for `summary.id` wherever it is cached within the group.
/// Returns whether any slot held the row.
fn replace_row(
    store: &CacheStore,
    keys: &[CollectionKey],
    summary: &EmployeeSummary,
    outcome: &mut ReconcileOutcome,
) -> bool {
    let mut replaced = false;
    for key in keys {
        let mut applied = false;
        store.patch_collection(key, |page| {
            if let Some(row) = page.items.iter_mut().find(|row| row.id == summary.id) {
                *row = summary.clone();
                applied = true;
            }
        });
        if applied {
            outcome.collections_patched += 1;
            replaced = true;
        }
    }
    replaced
}

/// Insert a newly created row at the head of the group's first page and bump
/// its count. Deeper pages shift by a row the client cannot name, so they are
/// invalidated. Re-applying the same result replaces the row instead of
/// inserting it twice.
fn insert_created_row(
    store: &CacheStore,
    keys: &[CollectionKey],
    summary: &EmployeeSummary,
    outcome: &mut ReconcileOutcome,
) {
    for key in keys {
        if key.page() == 1 {
            let mut applied = false;
            store.patch_collection(key, |page| {
                if let Some(row) = page.items.iter_mut().find(|row| row.id == summary.id) {
                    *row = summary.clone();
                } else {
                    page.prepend_capped(summary.clone());
                    page.adjust_total(1);
                }
                applied = true;
            });
            if applied {
                outcome.collections_patched += 1;
            }
        } else if store.invalidate_collection(key) {
            outcome.collections_invalidated += 1;
        }
    }
}

/// Remove the row for `id` from the page that holds it, fix counts on pages
/// before it, and invalidate pages after it (their contents shift by a row
/// the client cannot name). Returns whether any slot held the row.
fn remove_row_and_shift(
    store: &CacheStore,
    keys: &[CollectionKey],
    id: &RecordId,
    outcome: &mut ReconcileOutcome,
) -> bool {
    let Some(holder_page) = keys.iter().find_map(|key| {
        store
            .peek_collection(key)
            .is_some_and(|read| read.value.items.iter().any(|row| &row.id == id))
            .then(|| key.page())
    }) else {
        return false;
    };

    for key in keys {
        if key.page() < holder_page {
            if store.patch_collection(key, |page| page.adjust_total(-1)) {
                outcome.collections_patched += 1;
            }
        } else if key.page() == holder_page {
            let mut applied = false;
            store.patch_collection(key, |page| {
                if page.remove_where(|row| &row.id == id).is_some() {
                    page.adjust_total(-1);
                    applied = true;
                }
            });
            if applied {
                outcome.collections_patched += 1;
            }
        } else if store.invalidate_collection(key) {
            outcome.collections_invalidated += 1;
        }
    }
    true
}

/// Whether a record not visible in a group might still have been a member
/// before this mutation. True forces conservative invalidation.
fn prior_membership_unclear(filter: &CollectionFilter, prior: Option<&EmployeeSummary>) -> bool {
    match prior {
        Some(summary) => filter.evaluate(summary) != FilterMatch::Excluded,
        // No prior snapshot: membership cannot be evaluated client-side.
        None => true,
    }
}
