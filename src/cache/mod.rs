//! Cache subsystem.
//!
//! A single shared [`CacheStore`] holds every cached artifact (template
//! sources, compiled templates, analyses, assets, fetched data, domain
//! resolutions) under prefixed string keys. [`CacheInvalidationService`]
//! translates store change events into scoped deletions and best-effort edge
//! purges; [`keys`] is the single source of truth for key shapes.

pub mod config;
pub mod invalidation;
pub mod keys;
pub(crate) mod lock;
pub mod store;

pub use config::{CacheConfig, TtlTier};
pub use invalidation::{CacheInvalidationService, InvalidationRule, KeyPattern, rule_for};
pub use store::{CacheStats, CacheStore, CacheValue};
