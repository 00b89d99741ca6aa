//! Write boundary: mutation descriptors and their server-confirmed results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::fetch::FetchError;
use crate::domain::attachments::AttachmentRecord;
use crate::domain::error::DomainError;
use crate::domain::records::{EmployeeRecord, RecordId, RecordProfile};
use crate::domain::types::{AttachmentKind, EmploymentCategory};

/// Editable record fields, as collected by the forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub surname: String,
    pub given_name: String,
    pub category: EmploymentCategory,
    pub active: bool,
    pub profile: RecordProfile,
}

impl RecordDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.surname.trim().is_empty() {
            return Err(DomainError::validation("surname must not be blank"));
        }
        if self.given_name.trim().is_empty() {
            return Err(DomainError::validation("given name must not be blank"));
        }
        if self.profile.email.trim().is_empty() {
            return Err(DomainError::validation("email must not be blank"));
        }
        Ok(())
    }
}

/// File metadata submitted with an attachment mutation. Upload encoding is
/// the transport's concern; only the reference travels through here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub kind: AttachmentKind,
    pub file_name: String,
    pub content_type: Option<String>,
    pub reference: String,
}

/// One variant per write operation the front end performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationDescriptor {
    CreateRecord {
        draft: RecordDraft,
    },
    UpdateRecord {
        id: RecordId,
        draft: RecordDraft,
    },
    DeleteRecord {
        id: RecordId,
    },
    ToggleStatus {
        id: RecordId,
    },
    AddAttachment {
        record_id: RecordId,
        upload: AttachmentUpload,
    },
    /// `attachment_id` is `None` in flows that target the attachment by kind
    /// before the server has confirmed an id.
    UpdateAttachment {
        record_id: RecordId,
        attachment_id: Option<Uuid>,
        upload: AttachmentUpload,
    },
    DeleteAttachment {
        record_id: RecordId,
        attachment_id: Uuid,
    },
}

impl MutationDescriptor {
    /// Short human-readable phrase for status notes and logs.
    pub fn describe(&self) -> String {
        match self {
            MutationDescriptor::CreateRecord { .. } => "create record".to_string(),
            MutationDescriptor::UpdateRecord { id, .. } => format!("update record {id}"),
            MutationDescriptor::DeleteRecord { id } => format!("delete record {id}"),
            MutationDescriptor::ToggleStatus { id } => format!("toggle status of record {id}"),
            MutationDescriptor::AddAttachment { record_id, upload } => {
                format!("add {} attachment to record {record_id}", upload.kind.as_str())
            }
            MutationDescriptor::UpdateAttachment { record_id, upload, .. } => format!(
                "update {} attachment of record {record_id}",
                upload.kind.as_str()
            ),
            MutationDescriptor::DeleteAttachment { record_id, .. } => {
                format!("delete attachment of record {record_id}")
            }
        }
    }

    /// The record targeted by this mutation, when it exists yet.
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            MutationDescriptor::CreateRecord { .. } => None,
            MutationDescriptor::UpdateRecord { id, .. }
            | MutationDescriptor::DeleteRecord { id }
            | MutationDescriptor::ToggleStatus { id } => Some(id),
            MutationDescriptor::AddAttachment { record_id, .. }
            | MutationDescriptor::UpdateAttachment { record_id, .. }
            | MutationDescriptor::DeleteAttachment { record_id, .. } => Some(record_id),
        }
    }
}

/// Server-confirmed outcome of a write, shaped per mutation kind.
///
/// The reconciler only ever consumes confirmed results; optimistic UI state
/// is the caller's to roll back on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmedMutation {
    Created {
        record: EmployeeRecord,
    },
    Updated {
        record: EmployeeRecord,
    },
    Deleted {
        id: RecordId,
    },
    StatusToggled {
        record: EmployeeRecord,
    },
    AttachmentAdded {
        record_id: RecordId,
        attachment: AttachmentRecord,
    },
    AttachmentUpdated {
        record_id: RecordId,
        attachment: AttachmentRecord,
    },
    AttachmentDeleted {
        record_id: RecordId,
        attachment_id: Uuid,
    },
}

impl ConfirmedMutation {
    /// Short human-readable phrase for status notes and logs.
    pub fn describe(&self) -> String {
        match self {
            ConfirmedMutation::Created { record } => format!("record {} created", record.id),
            ConfirmedMutation::Updated { record } => format!("record {} updated", record.id),
            ConfirmedMutation::Deleted { id } => format!("record {id} deleted"),
            ConfirmedMutation::StatusToggled { record } => format!(
                "record {} {}",
                record.id,
                if record.active { "activated" } else { "deactivated" }
            ),
            ConfirmedMutation::AttachmentAdded { record_id, attachment } => format!(
                "{} attachment added to record {record_id}",
                attachment.kind.as_str()
            ),
            ConfirmedMutation::AttachmentUpdated { record_id, attachment } => format!(
                "{} attachment of record {record_id} updated",
                attachment.kind.as_str()
            ),
            ConfirmedMutation::AttachmentDeleted { record_id, .. } => {
                format!("attachment of record {record_id} deleted")
            }
        }
    }
}

/// Performs the network write for a mutation descriptor.
#[async_trait]
pub trait WriteAdapter: Send + Sync {
    async fn write(&self, descriptor: MutationDescriptor) -> Result<ConfirmedMutation, FetchError>;
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn sample_draft() -> RecordDraft {
        RecordDraft {
            surname: "CRUZ".to_string(),
            given_name: "Maria".to_string(),
            category: EmploymentCategory::Permanent,
            active: true,
            profile: RecordProfile {
                email: "maria.cruz@example.test".to_string(),
                phone: None,
                position: "Clerk".to_string(),
                hired_on: date!(2019 - 03 - 18),
                notes: None,
            },
        }
    }

    #[test]
    fn draft_validation_flags_blank_fields() {
        assert!(sample_draft().validate().is_ok());

        let mut blank_surname = sample_draft();
        blank_surname.surname = "  ".to_string();
        assert!(blank_surname.validate().is_err());

        let mut blank_email = sample_draft();
        blank_email.profile.email = String::new();
        assert!(blank_email.validate().is_err());
    }

    #[test]
    fn descriptor_descriptions_name_the_target() {
        let id = RecordId::new("E010").expect("valid id");
        let descriptor = MutationDescriptor::ToggleStatus { id: id.clone() };
        assert_eq!(descriptor.describe(), "toggle status of record E010");
        assert_eq!(descriptor.record_id(), Some(&id));

        let create = MutationDescriptor::CreateRecord {
            draft: sample_draft(),
        };
        assert_eq!(create.record_id(), None);
    }
}
