//! Attachment records and the per-kind uniqueness invariant.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;
use super::types::AttachmentKind;

const INLINE_PREVIEW_PREFIXES: &[&str] = &["image/", "text/"];
const INLINE_PREVIEW_EXACT: &[&str] = &["application/pdf"];

/// A typed file attached to exactly one record.
///
/// The id is assigned by the server on creation; flows that address an
/// attachment before its id is confirmed identify it by kind instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: Uuid,
    pub kind: AttachmentKind,
    pub file_name: String,
    pub content_type: String,
    pub reference: String,
    pub uploaded_at: OffsetDateTime,
}

/// Resolve a content type, falling back to a guess from the file name when the
/// server omitted one.
pub fn resolved_content_type(file_name: &str, declared: Option<&str>) -> String {
    match declared {
        Some(content_type) if !content_type.trim().is_empty() => content_type.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// Determine whether the provided content type should be rendered with an
/// inline preview link.
pub fn supports_inline_preview(content_type: &str) -> bool {
    INLINE_PREVIEW_PREFIXES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
        || INLINE_PREVIEW_EXACT.contains(&content_type)
}

/// Insert `incoming` into `sequence`, replacing any existing entry of the same
/// kind in place. Returns true when an entry was replaced.
///
/// Keeping the replaced entry's position preserves the sequence order the
/// server reported, so repeated application of the same confirmed result is a
/// no-op.
pub fn upsert_by_kind(sequence: &mut Vec<AttachmentRecord>, incoming: AttachmentRecord) -> bool {
    match sequence.iter_mut().find(|entry| entry.kind == incoming.kind) {
        Some(existing) => {
            *existing = incoming;
            true
        }
        None => {
            sequence.push(incoming);
            false
        }
    }
}

/// Validate the at-most-one-per-kind invariant over a server-reported sequence.
pub fn validate_kinds(sequence: &[AttachmentRecord]) -> Result<(), DomainError> {
    for (index, entry) in sequence.iter().enumerate() {
        if sequence[..index].iter().any(|prior| prior.kind == entry.kind) {
            return Err(DomainError::DuplicateAttachmentKind { kind: entry.kind });
        }
    }
    Ok(())
}
