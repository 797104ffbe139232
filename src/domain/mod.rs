//! Domain model: change events, data requirements, and storage-key rules.

pub mod change;
pub mod error;
pub mod requirements;
pub mod template;

pub use change::ChangeType;
pub use error::DomainError;
pub use requirements::{DataRequirement, LoadOptions, TemplateAnalysis};
