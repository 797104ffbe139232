//! Product data fetcher.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheStore, CacheValue, keys};
use crate::error::EngineError;

use super::RepoError;

pub const DEFAULT_PRODUCTS_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub store_id: String,
    pub title: String,
    pub handle: String,
    pub price: f64,
    #[serde(default)]
    pub compare_at_price: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub quantity: u32,
}

/// One page of a product listing, with the token for the next page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub next_token: Option<String>,
}

/// Backend access to product records.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(
        &self,
        store_id: &str,
        limit: u32,
        next_token: Option<&str>,
    ) -> Result<ProductPage, RepoError>;
    async fn get(&self, store_id: &str, product_id: &str) -> Result<Option<Product>, RepoError>;
    async fn featured(&self, store_id: &str, limit: u32) -> Result<Vec<Product>, RepoError>;
    async fn search(&self, store_id: &str, query: &str, limit: u32)
    -> Result<Vec<Product>, RepoError>;
    /// Handle-to-id map for the whole store, for URL resolution.
    async fn handle_map(&self, store_id: &str) -> Result<BTreeMap<String, String>, RepoError>;
}

/// Read-through product cache.
pub struct ProductFetcher {
    store: Arc<CacheStore>,
    repo: Arc<dyn ProductRepository>,
}

impl ProductFetcher {
    pub fn new(store: Arc<CacheStore>, repo: Arc<dyn ProductRepository>) -> Self {
        Self { store, repo }
    }

    pub async fn list_products(
        &self,
        store_id: &str,
        limit: Option<u32>,
        next_token: Option<&str>,
    ) -> Result<ProductPage, EngineError> {
        let limit = limit.unwrap_or(DEFAULT_PRODUCTS_LIMIT);
        let key = keys::products(store_id, limit, next_token);
        let ttl = self.store.config().data_ttl(None);
        self.cached(key, ttl, store_id, "products", self.repo.list(store_id, limit, next_token))
            .await
    }

    pub async fn product(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> Result<Option<Product>, EngineError> {
        let key = keys::product(store_id, product_id);
        if let Some(cached) = self.read_cached::<Product>(&key) {
            return Ok(Some(cached));
        }

        let fetched = self
            .repo
            .get(store_id, product_id)
            .await
            .map_err(|err| EngineError::data(store_id, "product", err.to_string()))?;
        if let Some(product) = &fetched {
            self.write_cached(key, store_id, "product", product, self.store.config().data_ttl(None))?;
        }
        Ok(fetched)
    }

    /// Resolve a product by its handle via the cached handle map.
    pub async fn product_by_handle(
        &self,
        store_id: &str,
        handle: &str,
    ) -> Result<Option<Product>, EngineError> {
        let map = self
            .cached::<BTreeMap<String, String>, _>(
                keys::product_handle_map(store_id),
                self.store.config().data_ttl(None),
                store_id,
                "product_handle_map",
                self.repo.handle_map(store_id),
            )
            .await?;
        match map.get(handle) {
            Some(product_id) => self.product(store_id, product_id).await,
            None => Ok(None),
        }
    }

    pub async fn featured_products(
        &self,
        store_id: &str,
        limit: u32,
    ) -> Result<Vec<Product>, EngineError> {
        let key = keys::featured_products(store_id, limit);
        let ttl = self.store.config().data_ttl(None);
        self.cached(key, ttl, store_id, "featured_products", self.repo.featured(store_id, limit))
            .await
    }

    pub async fn search_products(
        &self,
        store_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Product>, EngineError> {
        let key = keys::search_products(store_id, query, limit);
        let ttl = self.store.config().data_ttl(Some("search"));
        self.cached(key, ttl, store_id, "search_products", self.repo.search(store_id, query, limit))
            .await
    }

    fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.store.get(key)?.as_json()?;
        serde_json::from_value((*json).clone()).ok()
    }

    fn write_cached<T: Serialize>(
        &self,
        key: String,
        store_id: &str,
        entity: &'static str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), EngineError> {
        let json = serde_json::to_value(value)
            .map_err(|err| EngineError::data(store_id, entity, err.to_string()))?;
        self.store.set(key, CacheValue::Json(Arc::new(json)), ttl);
        Ok(())
    }

    async fn cached<T, Fut>(
        &self,
        key: String,
        ttl: Duration,
        store_id: &str,
        entity: &'static str,
        load: Fut,
    ) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        if let Some(cached) = self.read_cached(&key) {
            return Ok(cached);
        }

        debug!(store_id, entity, key, "Data cache miss");
        let fresh = load
            .await
            .map_err(|err| EngineError::data(store_id, entity, err.to_string()))?;
        self.write_cached(key, store_id, entity, &fresh, ttl)?;
        Ok(fresh)
    }
}
