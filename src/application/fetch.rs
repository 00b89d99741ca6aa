//! Read boundary: the transport-owned fetch adapter.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::Page;
use crate::cache::keys::CollectionKey;
use crate::domain::records::{EmployeeRecord, EmployeeSummary, RecordId};

/// A failed server request, as reported by the transport.
///
/// Timeouts are the adapter's concern; they surface here as a status of 408
/// or 504 with whatever message the adapter composed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server request failed with status {status}: {message}")]
pub struct FetchError {
    pub status: u16,
    pub message: String,
}

impl FetchError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Performs the network read for a query key.
///
/// Pure key → value; implementations carry no caching logic and no knowledge
/// of slot state. The cache layer is the only caller.
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    async fn fetch_collection(
        &self,
        key: &CollectionKey,
    ) -> Result<Page<EmployeeSummary>, FetchError>;

    async fn fetch_detail(&self, id: &RecordId) -> Result<EmployeeRecord, FetchError>;
}
