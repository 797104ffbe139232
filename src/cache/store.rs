//! Shared cache storage.
//!
//! One flat namespace of string keys to typed values, with per-entry TTLs.
//! Expired entries are dropped lazily on read; write paths respect the
//! development kill switch and the "zero TTL means never cache" rule.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::counter;

use crate::domain::TemplateAnalysis;
use crate::loader::compiler::CompiledTemplate;

use super::config::CacheConfig;

pub(crate) const METRIC_HIT: &str = "vetrina_cache_hit_total";
pub(crate) const METRIC_MISS: &str = "vetrina_cache_miss_total";
pub(crate) const METRIC_INVALIDATED: &str = "vetrina_cache_invalidated_total";

/// A cached value. Variants carry `Arc`s so reads hand out cheap clones.
#[derive(Debug, Clone)]
pub enum CacheValue {
    /// Raw template source.
    Text(Arc<str>),
    /// Binary asset, base64-encoded.
    Binary(Arc<str>),
    /// Parsed template from the embedding engine.
    Compiled(CompiledTemplate),
    /// Static analysis of a template body.
    Analysis(Arc<TemplateAnalysis>),
    /// Fetched merchant data.
    Json(Arc<serde_json::Value>),
}

impl CacheValue {
    pub fn text(content: impl Into<Arc<str>>) -> Self {
        Self::Text(content.into())
    }

    pub fn as_text(&self) -> Option<Arc<str>> {
        match self {
            Self::Text(content) => Some(Arc::clone(content)),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<Arc<str>> {
        match self {
            Self::Binary(encoded) => Some(Arc::clone(encoded)),
            _ => None,
        }
    }

    pub fn as_compiled(&self) -> Option<CompiledTemplate> {
        match self {
            Self::Compiled(compiled) => Some(compiled.clone()),
            _ => None,
        }
    }

    pub fn as_analysis(&self) -> Option<Arc<TemplateAnalysis>> {
        match self {
            Self::Analysis(analysis) => Some(Arc::clone(analysis)),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<Arc<serde_json::Value>> {
        match self {
            Self::Json(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    expires_at: Instant,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub active: usize,
}

/// Shared in-process cache.
///
/// All tiers (templates, analyses, assets, data, domains) share one
/// namespace; cache keys carry their tier as a literal prefix.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
    dev_cache_enabled: AtomicBool,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        let dev_cache_enabled = AtomicBool::new(config.dev_cache_enabled);
        Self {
            entries: DashMap::new(),
            config,
            dev_cache_enabled,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn should_use_cache(&self) -> bool {
        self.config
            .should_use_cache(self.dev_cache_enabled.load(Ordering::Relaxed))
    }

    /// Read a value, dropping it when its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        if !self.should_use_cache() {
            return None;
        }

        let expired = match self.entries.get(key) {
            None => {
                counter!(METRIC_MISS).increment(1);
                return None;
            }
            Some(entry) => {
                if entry.expires_at > Instant::now() {
                    counter!(METRIC_HIT).increment(1);
                    return Some(entry.value.clone());
                }
                true
            }
        };

        if expired {
            self.entries.remove(key);
            counter!(METRIC_MISS).increment(1);
        }
        None
    }

    /// Store a value. Zero TTLs and the development kill switch turn this
    /// into a no-op, so callers can set unconditionally.
    pub fn set(&self, key: impl Into<String>, value: CacheValue, ttl: Duration) {
        if !self.should_use_cache() || ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete_key(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            counter!(METRIC_INVALIDATED).increment(1);
        }
        removed
    }

    /// Delete every key starting with `prefix`. Returns the number removed.
    pub fn delete_by_prefix(&self, prefix: &str) -> usize {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &matching {
            self.entries.remove(key);
        }
        counter!(METRIC_INVALIDATED).increment(matching.len() as u64);
        matching.len()
    }

    /// Delete every key containing `fragment` (whole-store sweeps).
    pub fn delete_containing(&self, fragment: &str) -> usize {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().contains(fragment))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &matching {
            self.entries.remove(key);
        }
        counter!(METRIC_INVALIDATED).increment(matching.len() as u64);
        matching.len()
    }

    /// Eagerly expire one key: the entry stays until the next read, which
    /// sees a miss and refetches.
    pub fn expire_now(&self, key: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Instant::now();
                counter!(METRIC_INVALIDATED).increment(1);
                true
            }
            None => false,
        }
    }

    /// Eagerly expire every key starting with `prefix`.
    pub fn expire_by_prefix(&self, prefix: &str) -> usize {
        let now = Instant::now();
        let mut expired = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.key().starts_with(prefix) {
                entry.expires_at = now;
                expired += 1;
            }
        }
        counter!(METRIC_INVALIDATED).increment(expired as u64);
        expired
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        if !self.should_use_cache() {
            return CacheStats {
                total: 0,
                expired: 0,
                active: 0,
            };
        }
        let now = Instant::now();
        let total = self.entries.len();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .count();
        CacheStats {
            total,
            expired,
            active: total.saturating_sub(expired),
        }
    }

    // ========================================================================
    // Development controls
    // ========================================================================

    pub fn set_dev_cache_enabled(&self, enabled: bool) {
        self.dev_cache_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_dev_cache_enabled(&self) -> bool {
        self.dev_cache_enabled.load(Ordering::Relaxed)
    }
}
