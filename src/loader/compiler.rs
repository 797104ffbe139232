//! Template compilation seam.
//!
//! Parsing and rendering liquid is the job of the embedding render pipeline;
//! this crate only caches the result. `CompiledTemplate` is an opaque,
//! cheaply cloneable handle around whatever representation the engine
//! produces.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A parsed template as produced by the embedding engine.
#[derive(Clone)]
pub struct CompiledTemplate {
    inner: Arc<dyn Any + Send + Sync>,
}

impl CompiledTemplate {
    pub fn new<T: Any + Send + Sync>(compiled: T) -> Self {
        Self {
            inner: Arc::new(compiled),
        }
    }

    /// Recover the engine's representation. Returns `None` when the cached
    /// handle was produced by a different engine type.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Error)]
#[error("template compilation failed: {message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Compiles raw template source into the engine's parsed representation.
pub trait TemplateCompiler: Send + Sync {
    fn compile(&self, storage_key: &str, source: &str) -> Result<CompiledTemplate, CompileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_through_downcast() {
        let compiled = CompiledTemplate::new(String::from("parsed"));
        assert_eq!(
            compiled.downcast_ref::<String>().map(String::as_str),
            Some("parsed")
        );
        assert!(compiled.downcast_ref::<u32>().is_none());
    }
}
