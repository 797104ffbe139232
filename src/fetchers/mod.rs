//! Storefront data fetchers.
//!
//! Thin read-through caches over repository traits. The fetchers own no
//! business logic; they resolve cache keys, pick the right data-tier TTL,
//! and delegate misses to whatever backend implements the repository.

pub mod cart;
pub mod product;

pub use cart::{Cart, CartFetcher, CartItem, CartRepository};
pub use product::{Product, ProductFetcher, ProductPage, ProductRepository};

use thiserror::Error;

/// Backend failure reported by a repository implementation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RepoError {
    message: String,
}

impl RepoError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
