//! Employee record entities, summaries, and client-evaluable filters.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::attachments::AttachmentRecord;
use super::error::DomainError;
use super::types::EmploymentCategory;

/// Stable server-assigned record identifier, e.g. `"E010"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::BlankRecordId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The projection of a record carried by collection pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub id: RecordId,
    pub surname: String,
    pub given_name: String,
    pub category: EmploymentCategory,
    pub active: bool,
    pub updated_at: OffsetDateTime,
}

/// Detail-only scalar attributes, absent from collection projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProfile {
    pub email: String,
    pub phone: Option<String>,
    pub position: String,
    pub hired_on: Date,
    pub notes: Option<String>,
}

/// A complete record as confirmed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: RecordId,
    pub surname: String,
    pub given_name: String,
    pub category: EmploymentCategory,
    pub active: bool,
    pub profile: RecordProfile,
    pub attachments: Vec<AttachmentRecord>,
    pub updated_at: OffsetDateTime,
}

impl EmployeeRecord {
    pub fn summary(&self) -> EmployeeSummary {
        EmployeeSummary {
            id: self.id.clone(),
            surname: self.surname.clone(),
            given_name: self.given_name.clone(),
            category: self.category,
            active: self.active,
            updated_at: self.updated_at,
        }
    }
}

/// The value held by a detail cache slot.
///
/// A slot seeded from a collection row only carries the summary-projected
/// fields; `profile` and `attachments` are then `None`, meaning *not yet
/// loaded* rather than *loaded and empty*.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDetail {
    pub id: RecordId,
    pub surname: String,
    pub given_name: String,
    pub category: EmploymentCategory,
    pub active: bool,
    pub updated_at: OffsetDateTime,
    pub profile: Option<RecordProfile>,
    pub attachments: Option<Vec<AttachmentRecord>>,
}

impl RecordDetail {
    pub fn from_record(record: EmployeeRecord) -> Self {
        Self {
            id: record.id,
            surname: record.surname,
            given_name: record.given_name,
            category: record.category,
            active: record.active,
            updated_at: record.updated_at,
            profile: Some(record.profile),
            attachments: Some(record.attachments),
        }
    }

    pub fn from_summary(summary: &EmployeeSummary) -> Self {
        Self {
            id: summary.id.clone(),
            surname: summary.surname.clone(),
            given_name: summary.given_name.clone(),
            category: summary.category,
            active: summary.active,
            updated_at: summary.updated_at,
            profile: None,
            attachments: None,
        }
    }

    /// Whether every detail-only field has been loaded.
    pub fn is_complete(&self) -> bool {
        self.profile.is_some() && self.attachments.is_some()
    }

    pub fn summary(&self) -> EmployeeSummary {
        EmployeeSummary {
            id: self.id.clone(),
            surname: self.surname.clone(),
            given_name: self.given_name.clone(),
            category: self.category,
            active: self.active,
            updated_at: self.updated_at,
        }
    }
}

// ============================================================================
// Collection filters
// ============================================================================

/// Outcome of evaluating a filter against a summary on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMatch {
    /// The record belongs to the filtered collection.
    Matches,
    /// The record does not belong to the filtered collection.
    Excluded,
    /// Membership depends on a server-evaluated component and must not be
    /// guessed on the client.
    Indeterminate,
}

/// Filter portion of a collection query.
///
/// Canonical form: `search` is trimmed and lowercased, with the empty string
/// collapsed to `None`, so two filters built from differently-spelled but
/// semantically identical parameters compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CollectionFilter {
    pub category: Option<EmploymentCategory>,
    pub active: Option<bool>,
    pub search: Option<String>,
}

impl CollectionFilter {
    pub fn new(
        category: Option<EmploymentCategory>,
        active: Option<bool>,
        search: Option<&str>,
    ) -> Self {
        Self {
            category,
            active,
            search: normalize_search(search),
        }
    }

    /// Re-derive the canonical form of this filter.
    pub fn canonical(&self) -> Self {
        Self {
            category: self.category,
            active: self.active,
            search: normalize_search(self.search.as_deref()),
        }
    }

    /// Evaluate membership of `summary` in this filtered collection.
    ///
    /// Free-text search is matched server-side with semantics the client does
    /// not know, so any filter carrying a search term is `Indeterminate`.
    pub fn evaluate(&self, summary: &EmployeeSummary) -> FilterMatch {
        if self.search.is_some() {
            return FilterMatch::Indeterminate;
        }
        if let Some(category) = self.category
            && category != summary.category
        {
            return FilterMatch::Excluded;
        }
        if let Some(active) = self.active
            && active != summary.active
        {
            return FilterMatch::Excluded;
        }
        FilterMatch::Matches
    }
}

fn normalize_search(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}
