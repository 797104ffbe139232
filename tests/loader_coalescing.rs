use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use vetrina::cache::{CacheConfig, CacheStore};
use vetrina::error::EngineError;
use vetrina::loader::TemplateLoader;
use vetrina::loader::compiler::{CompileError, CompiledTemplate, TemplateCompiler};
use vetrina::loader::origin::{OriginError, TemplateOrigin};

const FETCH_DELAY: Duration = Duration::from_millis(50);

/// Origin double that counts fetches and is slow enough for concurrent
/// loads to overlap.
struct SlowOrigin {
    objects: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl SlowOrigin {
    fn new(objects: &[(&str, &str)]) -> Self {
        Self {
            objects: objects
                .iter()
                .map(|(key, body)| (key.to_string(), body.to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateOrigin for SlowOrigin {
    async fn fetch_text(&self, key: &str) -> Result<String, OriginError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(FETCH_DELAY).await;
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| OriginError::not_found(key))
    }

    async fn fetch_bytes(&self, key: &str) -> Result<Bytes, OriginError> {
        let text = self.fetch_text(key).await?;
        Ok(Bytes::from(text.into_bytes()))
    }

    fn describe(&self) -> &'static str {
        "slow"
    }
}

struct PassthroughCompiler;

impl TemplateCompiler for PassthroughCompiler {
    fn compile(&self, _storage_key: &str, source: &str) -> Result<CompiledTemplate, CompileError> {
        Ok(CompiledTemplate::new(source.to_string()))
    }
}

fn loader_with(
    objects: &[(&str, &str)],
    config: CacheConfig,
    production: bool,
) -> (Arc<TemplateLoader>, Arc<SlowOrigin>) {
    let store = Arc::new(CacheStore::new(config));
    let origin = Arc::new(SlowOrigin::new(objects));
    let loader = Arc::new(TemplateLoader::new(
        store,
        Arc::clone(&origin) as Arc<dyn TemplateOrigin>,
        Arc::new(PassthroughCompiler),
        production,
    ));
    (loader, origin)
}

#[tokio::test]
async fn concurrent_production_loads_fetch_once() {
    let (loader, origin) = loader_with(
        &[("templates/s1/layout/theme.liquid", "layout body")],
        CacheConfig::default(),
        true,
    );

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load_main_layout("s1").await })
        })
        .collect();

    for result in join_all(tasks).await {
        let body = result.expect("task completes").expect("template loads");
        assert_eq!(&*body, "layout body");
    }
    assert_eq!(origin.fetch_count(), 1);

    let stats = loader.coalescer_stats();
    assert_eq!(stats.total_requests, stats.new_requests + stats.coalesced_requests);
    assert_eq!(stats.new_requests, 1);
    assert_eq!(stats.coalesced_requests, 9);
}

#[tokio::test]
async fn failures_reach_every_coalesced_waiter() {
    let (loader, origin) = loader_with(&[], CacheConfig::default(), true);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load_template("s1", "missing").await })
        })
        .collect();

    for result in join_all(tasks).await {
        let err = result.expect("task completes").expect_err("template missing");
        assert!(matches!(err, EngineError::TemplateNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }
    assert_eq!(origin.fetch_count(), 1);
}

#[tokio::test]
async fn expired_template_refetches_exactly_once() {
    let config = CacheConfig {
        template_ttl_ms: 30,
        ..Default::default()
    };
    let (loader, origin) = loader_with(
        &[("templates/s1/sections/hero.liquid", "hero body")],
        config,
        true,
    );

    loader.load_section("s1", "hero").await.expect("loads");
    // Within the TTL the cached copy is served.
    loader.load_section("s1", "hero").await.expect("loads");
    assert_eq!(origin.fetch_count(), 1);

    tokio::time::sleep(Duration::from_millis(60)).await;

    let refetched = loader.load_section("s1", "hero").await.expect("loads");
    assert_eq!(&*refetched, "hero body");
    assert_eq!(origin.fetch_count(), 2);
}

#[tokio::test]
async fn development_loads_skip_coalescing_but_still_cache() {
    let config = CacheConfig {
        development: true,
        ..Default::default()
    };
    let (loader, origin) = loader_with(
        &[("templates/s1/sections/hero.liquid", "hero")],
        config,
        false,
    );

    loader.load_section("s1", "hero").await.expect("loads");
    loader.load_section("s1", "hero").await.expect("loads");

    assert_eq!(origin.fetch_count(), 1);
    assert_eq!(loader.coalescer_stats().total_requests, 0);
}

#[tokio::test]
async fn disabled_dev_cache_fetches_every_time() {
    let config = CacheConfig {
        development: true,
        dev_cache_enabled: false,
        ..Default::default()
    };
    let (loader, origin) = loader_with(
        &[("templates/s1/sections/hero.liquid", "hero")],
        config,
        false,
    );

    loader.load_section("s1", "hero").await.expect("loads");
    loader.load_section("s1", "hero").await.expect("loads");

    assert_eq!(origin.fetch_count(), 2);
}

#[tokio::test]
async fn concurrent_asset_loads_fetch_once_even_in_development() {
    let config = CacheConfig {
        development: true,
        ..Default::default()
    };
    let (loader, origin) = loader_with(
        &[("templates/s1/assets/site.css", "body { color: red }")],
        config,
        false,
    );

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load_asset("s1", "site.css").await })
        })
        .collect();

    for result in join_all(tasks).await {
        let bytes = result.expect("task completes").expect("asset loads");
        assert_eq!(&bytes[..], b"body { color: red }");
    }
    assert_eq!(origin.fetch_count(), 1);
}

#[tokio::test]
async fn compiled_loads_share_one_origin_fetch() {
    let (loader, origin) = loader_with(
        &[("templates/s1/layout/theme.liquid", "layout body")],
        CacheConfig::default(),
        true,
    );

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load_main_layout_compiled("s1").await })
        })
        .collect();

    for result in join_all(tasks).await {
        let compiled = result.expect("task completes").expect("layout compiles");
        assert_eq!(
            compiled.downcast_ref::<String>().map(String::as_str),
            Some("layout body")
        );
    }
    assert_eq!(origin.fetch_count(), 1);
}
