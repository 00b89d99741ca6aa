use thiserror::Error;

use super::types::AttachmentKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("record identifier must not be blank")]
    BlankRecordId,
    #[error("record validation failed: {message}")]
    Validation { message: String },
    #[error("duplicate attachment kind `{}` in sequence", kind.as_str())]
    DuplicateAttachmentKind { kind: AttachmentKind },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
