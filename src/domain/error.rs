use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("unknown change type `{value}`")]
    UnknownChangeType { value: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn unknown_change_type(value: impl Into<String>) -> Self {
        Self::UnknownChangeType {
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
