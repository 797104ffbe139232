//! Engine error taxonomy.
//!
//! Errors are cloneable: coalesced template loads broadcast one outcome to
//! every waiter, so failures must fan out as cheaply as successes.

use thiserror::Error;

use crate::domain::DomainError;
use crate::infra::error::InfraError;
use crate::loader::compiler::CompileError;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The origin has no template under this key. Renders as a 404.
    #[error("template not found: {key}")]
    TemplateNotFound { key: String },
    /// The embedding engine rejected the template source.
    #[error("template compilation failed for `{key}`: {message}")]
    Compile { key: String, message: String },
    /// A data fetch behind a repository trait failed.
    #[error("data fetch failed for {entity} in store `{store_id}`: {message}")]
    Data {
        store_id: String,
        entity: &'static str,
        message: String,
    },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl EngineError {
    pub fn template_not_found(key: impl Into<String>) -> Self {
        Self::TemplateNotFound { key: key.into() }
    }

    pub fn compile(key: impl Into<String>, error: CompileError) -> Self {
        Self::Compile {
            key: key.into(),
            message: error.message,
        }
    }

    pub fn data(
        store_id: impl Into<String>,
        entity: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Data {
            store_id: store_id.into(),
            entity,
            message: message.into(),
        }
    }

    /// HTTP status the embedding server should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TemplateNotFound { .. } => 404,
            Self::Compile { .. } | Self::Data { .. } | Self::Domain(_) | Self::Infra(_) => 500,
        }
    }
}
