//! Cart data fetcher.
//!
//! Cart contents change on every add-to-cart click, so the data-tier TTL
//! here is the shortest in the engine and rendered cart pages are never
//! cached at all (see `CacheConfig`).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheStore, CacheValue, keys};
use crate::error::EngineError;

use super::RepoError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub title: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    pub store_id: String,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Cart {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum()
    }
}

/// Backend access to cart records.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn cart(&self, store_id: &str, cart_id: &str) -> Result<Option<Cart>, RepoError>;
}

/// Read-through cart cache.
pub struct CartFetcher {
    store: Arc<CacheStore>,
    repo: Arc<dyn CartRepository>,
}

impl CartFetcher {
    pub fn new(store: Arc<CacheStore>, repo: Arc<dyn CartRepository>) -> Self {
        Self { store, repo }
    }

    pub async fn cart(&self, store_id: &str, cart_id: &str) -> Result<Option<Cart>, EngineError> {
        let key = keys::cart(store_id, cart_id);
        if let Some(value) = self.store.get(&key)
            && let Some(json) = value.as_json()
            && let Ok(cart) = serde_json::from_value::<Cart>((*json).clone())
        {
            return Ok(Some(cart));
        }

        debug!(store_id, cart_id, "Cart cache miss");
        let fetched = self
            .repo
            .cart(store_id, cart_id)
            .await
            .map_err(|err| EngineError::data(store_id, "cart", err.to_string()))?;
        if let Some(cart) = &fetched {
            let json = serde_json::to_value(cart)
                .map_err(|err| EngineError::data(store_id, "cart", err.to_string()))?;
            self.store.set(
                key,
                CacheValue::Json(Arc::new(json)),
                self.store.config().data_ttl(Some("cart")),
            );
        }
        Ok(fetched)
    }

    /// Drop the cached copy after a mutation so the next read is fresh.
    pub fn invalidate(&self, store_id: &str, cart_id: &str) {
        self.store.delete_key(&keys::cart(store_id, cart_id));
    }
}
