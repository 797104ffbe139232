//! Template analysis.
//!
//! [`detector::LiquidSyntaxDetector`] is the pure analyzer;
//! [`TemplateAnalyzer`] wraps it with per-template caching so each distinct
//! body is only scanned once per TTL window.

pub mod detector;

use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheStore, CacheValue, keys};
use crate::domain::TemplateAnalysis;

pub use detector::LiquidSyntaxDetector;

/// Caching facade over the syntax detector.
pub struct TemplateAnalyzer {
    store: Arc<CacheStore>,
}

impl TemplateAnalyzer {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// Analyze a template body, reusing the cached analysis when present.
    ///
    /// Analyses share the template tier's TTL: a template change invalidates
    /// both the source and its analysis together.
    pub fn analyze(&self, store_id: &str, storage_key: &str, content: &str) -> Arc<TemplateAnalysis> {
        let cache_key = keys::analysis(store_id, storage_key);
        if let Some(value) = self.store.get(&cache_key)
            && let Some(analysis) = value.as_analysis()
        {
            return analysis;
        }

        let analysis = Arc::new(LiquidSyntaxDetector::analyze(content));
        debug!(
            store_id,
            storage_key,
            requirements = analysis.required_data.len(),
            dependencies = analysis.dependencies.len(),
            "Analyzed template"
        );
        self.store.set(
            cache_key,
            CacheValue::Analysis(Arc::clone(&analysis)),
            self.store.config().template_ttl(),
        );
        analysis
    }
}
