//! Multi-tenant storefront template engine: cached template loading,
//! static template analysis, and cache coherence across stores.
//!
//! The crate is organized around one [`cache::CacheStore`] shared by three
//! consumers:
//!
//! - [`loader::TemplateLoader`] reads theme files through the cache with
//!   request coalescing against the origin,
//! - [`analysis::TemplateAnalyzer`] caches static analyses of template
//!   bodies so renderers know what data to prefetch,
//! - [`cache::CacheInvalidationService`] maps merchant change events to
//!   targeted deletions plus best-effort edge purges.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetchers;
pub mod infra;
pub mod loader;

use std::sync::Arc;

use url::Url;

use cache::{CacheConfig, CacheInvalidationService, CacheStore};
use config::{OriginSettings, Settings};
use error::EngineError;
use infra::edge::{CdnPurger, EdgeCache};
use loader::TemplateLoader;
use loader::compiler::TemplateCompiler;
use loader::origin::{CdnOrigin, ObjectStoreOrigin, TemplateOrigin};

pub use analysis::TemplateAnalyzer;
pub use cache::CacheInvalidationService as InvalidationService;
pub use loader::TemplateLoader as Loader;

/// Fully-wired engine: one shared cache behind a loader, an analyzer, and
/// the invalidation service.
pub struct Engine {
    store: Arc<CacheStore>,
    loader: Arc<TemplateLoader>,
    analyzer: Arc<TemplateAnalyzer>,
    invalidation: Arc<CacheInvalidationService>,
}

impl Engine {
    /// Wire an engine from resolved settings and a template compiler.
    pub fn from_settings(
        settings: &Settings,
        compiler: Arc<dyn TemplateCompiler>,
    ) -> Result<Self, EngineError> {
        let store = Arc::new(CacheStore::new(CacheConfig::from(&settings.cache)));
        let origin = build_origin(&settings.origin)?;
        let edge = CdnPurger::from_settings(&settings.edge)?
            .map(|purger| Arc::new(purger) as Arc<dyn EdgeCache>);

        let loader = Arc::new(TemplateLoader::new(
            Arc::clone(&store),
            origin,
            compiler,
            settings.is_production(),
        ));
        let analyzer = Arc::new(TemplateAnalyzer::new(Arc::clone(&store)));
        let invalidation = Arc::new(CacheInvalidationService::new(Arc::clone(&store), edge));

        Ok(Self {
            store,
            loader,
            analyzer,
            invalidation,
        })
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn loader(&self) -> &Arc<TemplateLoader> {
        &self.loader
    }

    pub fn analyzer(&self) -> &Arc<TemplateAnalyzer> {
        &self.analyzer
    }

    pub fn invalidation(&self) -> &Arc<CacheInvalidationService> {
        &self.invalidation
    }
}

fn build_origin(origin: &OriginSettings) -> Result<Arc<dyn TemplateOrigin>, EngineError> {
    Ok(match origin {
        OriginSettings::Cdn { base_url } => Arc::new(CdnOrigin::new(Url::clone(base_url))?),
        OriginSettings::ObjectStore { endpoint, bucket } => {
            Arc::new(ObjectStoreOrigin::new(Url::clone(endpoint), bucket)?)
        }
    })
}
