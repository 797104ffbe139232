//! Template loading.
//!
//! Read-through cache over a [`TemplateOrigin`], with request coalescing in
//! production so a cold cache never causes a thundering herd against the
//! CDN. Compiled templates sit in their own cache tier keyed alongside the
//! raw source; binary assets are cached base64-encoded.

pub mod coalesce;
pub mod compiler;
pub mod origin;

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, CacheValue, keys};
use crate::domain::template::{asset_storage_key, resolve_storage_key};
use crate::error::EngineError;

use coalesce::{Registration, RequestCoalescer};
use compiler::{CompiledTemplate, TemplateCompiler};
use origin::TemplateOrigin;

pub(crate) const METRIC_FETCH_TOTAL: &str = "vetrina_origin_fetch_total";
pub(crate) const METRIC_FETCH_MS: &str = "vetrina_origin_fetch_ms";

const MAIN_LAYOUT: &str = "layout/theme.liquid";

type TextOutcome = Result<Arc<str>, EngineError>;
type BytesOutcome = Result<Bytes, EngineError>;

/// Loads raw, compiled, and binary theme files for stores.
pub struct TemplateLoader {
    store: Arc<CacheStore>,
    origin: Arc<dyn TemplateOrigin>,
    compiler: Arc<dyn TemplateCompiler>,
    production: bool,
    template_requests: RequestCoalescer<TextOutcome>,
    asset_requests: RequestCoalescer<BytesOutcome>,
}

impl TemplateLoader {
    pub fn new(
        store: Arc<CacheStore>,
        origin: Arc<dyn TemplateOrigin>,
        compiler: Arc<dyn TemplateCompiler>,
        production: bool,
    ) -> Self {
        Self {
            store,
            origin,
            compiler,
            production,
            template_requests: RequestCoalescer::new(),
            asset_requests: RequestCoalescer::new(),
        }
    }

    /// Load raw template source by caller-facing name.
    pub async fn load_template(
        &self,
        store_id: &str,
        template_name: &str,
    ) -> Result<Arc<str>, EngineError> {
        let storage_key = resolve_storage_key(store_id, template_name);
        self.load_by_storage_key(store_id, &storage_key).await
    }

    /// Load and compile a template, with both tiers cached.
    pub async fn load_compiled_template(
        &self,
        store_id: &str,
        template_name: &str,
    ) -> Result<CompiledTemplate, EngineError> {
        let storage_key = resolve_storage_key(store_id, template_name);
        let compiled_key = keys::compiled_template(store_id, &storage_key);
        if let Some(value) = self.store.get(&compiled_key)
            && let Some(compiled) = value.as_compiled()
        {
            return Ok(compiled);
        }

        let source = self.load_by_storage_key(store_id, &storage_key).await?;
        let compiled = self
            .compiler
            .compile(&storage_key, &source)
            .map_err(|err| EngineError::compile(&storage_key, err))?;
        self.store.set(
            compiled_key,
            CacheValue::Compiled(compiled.clone()),
            self.store.config().template_ttl(),
        );
        Ok(compiled)
    }

    /// Load a binary theme asset, decoded from the base64 cache tier.
    ///
    /// Asset loads coalesce in every environment; they are fetched by
    /// browsers in bursts regardless of environment.
    pub async fn load_asset(&self, store_id: &str, asset_path: &str) -> Result<Bytes, EngineError> {
        let cache_key = keys::asset(store_id, asset_path);
        if let Some(value) = self.store.get(&cache_key)
            && let Some(encoded) = value.as_binary()
            && let Ok(decoded) = BASE64.decode(encoded.as_bytes())
        {
            return Ok(Bytes::from(decoded));
        }

        match self.asset_requests.register(&cache_key) {
            Registration::Leader(token) => {
                let outcome = self.fetch_asset(store_id, asset_path, &cache_key).await;
                token.complete(outcome.clone());
                outcome
            }
            Registration::Follower(mut receiver) => match receiver.recv().await {
                Ok(outcome) => outcome,
                // Leader was cancelled; fetch for ourselves.
                Err(_) => self.fetch_asset(store_id, asset_path, &cache_key).await,
            },
        }
    }

    pub async fn load_main_layout(&self, store_id: &str) -> Result<Arc<str>, EngineError> {
        self.load_template(store_id, MAIN_LAYOUT).await
    }

    pub async fn load_main_layout_compiled(
        &self,
        store_id: &str,
    ) -> Result<CompiledTemplate, EngineError> {
        self.load_compiled_template(store_id, MAIN_LAYOUT).await
    }

    pub async fn load_section(
        &self,
        store_id: &str,
        section_name: &str,
    ) -> Result<Arc<str>, EngineError> {
        self.load_template(store_id, section_name).await
    }

    pub async fn load_section_compiled(
        &self,
        store_id: &str,
        section_name: &str,
    ) -> Result<CompiledTemplate, EngineError> {
        self.load_compiled_template(store_id, section_name).await
    }

    /// Eagerly expire one template's raw and compiled entries.
    pub fn invalidate_template_cache(&self, store_id: &str, template_name: &str) {
        let storage_key = resolve_storage_key(store_id, template_name);
        self.store
            .expire_now(&keys::template(store_id, &storage_key));
        self.store
            .expire_now(&keys::compiled_template(store_id, &storage_key));
        info!(store_id, storage_key, "Invalidated template cache entries");
    }

    /// Eagerly expire every template entry a store owns.
    pub fn invalidate_store_templates(&self, store_id: &str) {
        let raw = self
            .store
            .expire_by_prefix(&keys::templates_prefix(store_id));
        let compiled = self
            .store
            .expire_by_prefix(&keys::compiled_templates_prefix(store_id));
        info!(store_id, raw, compiled, "Invalidated store template caches");
    }

    /// Coalescing effectiveness for template fetches.
    pub fn coalescer_stats(&self) -> coalesce::CoalescerStats {
        self.template_requests.stats()
    }

    async fn load_by_storage_key(
        &self,
        store_id: &str,
        storage_key: &str,
    ) -> Result<Arc<str>, EngineError> {
        let cache_key = keys::template(store_id, storage_key);
        if let Some(value) = self.store.get(&cache_key)
            && let Some(text) = value.as_text()
        {
            return Ok(text);
        }

        // Development skips coalescing so edits show up immediately and
        // a hung fetch never blocks unrelated renders.
        if !self.production {
            return self.fetch_template(storage_key, &cache_key).await;
        }

        match self.template_requests.register(&cache_key) {
            Registration::Leader(token) => {
                let outcome = self.fetch_template(storage_key, &cache_key).await;
                token.complete(outcome.clone());
                outcome
            }
            Registration::Follower(mut receiver) => match receiver.recv().await {
                Ok(outcome) => outcome,
                Err(_) => self.fetch_template(storage_key, &cache_key).await,
            },
        }
    }

    async fn fetch_template(&self, storage_key: &str, cache_key: &str) -> TextOutcome {
        counter!(METRIC_FETCH_TOTAL).increment(1);
        let started = Instant::now();
        let fetched = self.origin.fetch_text(storage_key).await;
        histogram!(METRIC_FETCH_MS).record(started.elapsed().as_millis() as f64);

        let content = match fetched {
            Ok(content) => content,
            Err(err) => {
                // Misses and transport failures alike surface as 404; the
                // storefront falls back to its not-found page either way.
                warn!(storage_key, origin = self.origin.describe(), error = %err, "Template fetch failed");
                return Err(EngineError::template_not_found(storage_key));
            }
        };

        debug!(storage_key, origin = self.origin.describe(), bytes = content.len(), "Fetched template");
        let content: Arc<str> = Arc::from(content);
        self.store.set(
            cache_key.to_string(),
            CacheValue::Text(Arc::clone(&content)),
            self.store.config().template_ttl(),
        );
        Ok(content)
    }

    async fn fetch_asset(&self, store_id: &str, asset_path: &str, cache_key: &str) -> BytesOutcome {
        let storage_key = asset_storage_key(store_id, asset_path);
        counter!(METRIC_FETCH_TOTAL).increment(1);
        let started = Instant::now();
        let fetched = self.origin.fetch_bytes(&storage_key).await;
        histogram!(METRIC_FETCH_MS).record(started.elapsed().as_millis() as f64);

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(storage_key, origin = self.origin.describe(), error = %err, "Asset fetch failed");
                return Err(EngineError::template_not_found(storage_key));
            }
        };

        let encoded: Arc<str> = Arc::from(BASE64.encode(&bytes));
        self.store.set(
            cache_key.to_string(),
            CacheValue::Binary(encoded),
            self.store.config().template_ttl(),
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::cache::CacheConfig;
    use crate::loader::compiler::CompileError;
    use crate::loader::origin::OriginError;

    use super::*;

    struct MapOrigin {
        objects: HashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
    }

    impl MapOrigin {
        fn new(objects: &[(&str, &str)]) -> Self {
            Self {
                objects: objects
                    .iter()
                    .map(|(key, body)| (key.to_string(), body.as_bytes().to_vec()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TemplateOrigin for MapOrigin {
        async fn fetch_text(&self, key: &str) -> Result<String, OriginError> {
            let bytes = self.fetch_bytes(key).await?;
            String::from_utf8(bytes.to_vec()).map_err(|err| OriginError::transport(key, err.to_string()))
        }

        async fn fetch_bytes(&self, key: &str) -> Result<Bytes, OriginError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.objects
                .get(key)
                .map(|bytes| Bytes::from(bytes.clone()))
                .ok_or_else(|| OriginError::not_found(key))
        }

        fn describe(&self) -> &'static str {
            "map"
        }
    }

    struct UppercaseCompiler;

    impl TemplateCompiler for UppercaseCompiler {
        fn compile(&self, _storage_key: &str, source: &str) -> Result<CompiledTemplate, CompileError> {
            if source.contains("{% broken %}") {
                return Err(CompileError::new("unexpected tag `broken`"));
            }
            Ok(CompiledTemplate::new(source.to_uppercase()))
        }
    }

    fn loader_with(
        objects: &[(&str, &str)],
        production: bool,
    ) -> (TemplateLoader, Arc<MapOrigin>, Arc<CacheStore>) {
        let store = Arc::new(CacheStore::new(CacheConfig::default()));
        let origin = Arc::new(MapOrigin::new(objects));
        let loader = TemplateLoader::new(
            Arc::clone(&store),
            Arc::clone(&origin) as Arc<dyn TemplateOrigin>,
            Arc::new(UppercaseCompiler),
            production,
        );
        (loader, origin, store)
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let (loader, origin, _store) =
            loader_with(&[("templates/s1/sections/cart.liquid", "cart body")], true);

        let first = loader.load_template("s1", "cart").await.expect("template loads");
        assert_eq!(&*first, "cart body");
        let second = loader.load_template("s1", "cart").await.expect("template loads");
        assert_eq!(&*second, "cart body");
        assert_eq!(origin.fetch_count(), 1);
    }

    #[tokio::test]
    async fn missing_template_is_a_404() {
        let (loader, _origin, _store) = loader_with(&[], true);

        let err = loader
            .load_template("s1", "cart")
            .await
            .expect_err("missing template");
        assert_eq!(err.status_code(), 404);
        assert!(matches!(err, EngineError::TemplateNotFound { .. }));
    }

    #[tokio::test]
    async fn compiled_templates_reuse_the_raw_tier() {
        let (loader, origin, _store) =
            loader_with(&[("templates/s1/layout/theme.liquid", "layout body")], true);

        let compiled = loader
            .load_main_layout_compiled("s1")
            .await
            .expect("layout compiles");
        assert_eq!(
            compiled.downcast_ref::<String>().map(String::as_str),
            Some("LAYOUT BODY")
        );

        // Second compiled load hits the compiled tier; no extra origin fetch.
        loader
            .load_main_layout_compiled("s1")
            .await
            .expect("layout compiles");
        assert_eq!(origin.fetch_count(), 1);
    }

    #[tokio::test]
    async fn compile_failure_maps_to_500() {
        let (loader, _origin, _store) = loader_with(
            &[("templates/s1/sections/hero.liquid", "{% broken %}")],
            true,
        );

        let err = loader
            .load_compiled_template("s1", "hero")
            .await
            .expect_err("compilation fails");
        assert_eq!(err.status_code(), 500);
        assert!(matches!(err, EngineError::Compile { .. }));
    }

    #[tokio::test]
    async fn assets_round_trip_through_base64() {
        let (loader, origin, store) =
            loader_with(&[("templates/s1/assets/logo.svg", "<svg/>")], true);

        let bytes = loader.load_asset("s1", "logo.svg").await.expect("asset loads");
        assert_eq!(&bytes[..], b"<svg/>");

        // Cached entry is base64 text.
        let cached = store
            .get(&keys::asset("s1", "logo.svg"))
            .and_then(|value| value.as_binary())
            .expect("asset cached");
        assert_eq!(&*cached, BASE64.encode(b"<svg/>"));

        let again = loader.load_asset("s1", "logo.svg").await.expect("asset loads");
        assert_eq!(&again[..], b"<svg/>");
        assert_eq!(origin.fetch_count(), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let (loader, origin, _store) =
            loader_with(&[("templates/s1/sections/cart.liquid", "cart body")], true);

        loader.load_template("s1", "cart").await.expect("template loads");
        loader.invalidate_template_cache("s1", "cart");
        loader.load_template("s1", "cart").await.expect("template loads");

        assert_eq!(origin.fetch_count(), 2);
    }

    #[tokio::test]
    async fn store_wide_invalidation_covers_all_templates() {
        let (loader, origin, _store) = loader_with(
            &[
                ("templates/s1/sections/cart.liquid", "cart"),
                ("templates/s1/layout/theme.liquid", "layout"),
            ],
            true,
        );

        loader.load_template("s1", "cart").await.expect("loads");
        loader.load_main_layout("s1").await.expect("loads");
        loader.invalidate_store_templates("s1");
        loader.load_template("s1", "cart").await.expect("loads");
        loader.load_main_layout("s1").await.expect("loads");

        assert_eq!(origin.fetch_count(), 4);
    }
}
