//! Cache configuration.
//!
//! Tiered TTL policy plus development-mode controls, loaded from
//! `vetrina.toml`. TTLs are hybrid: each tier carries a default and a small
//! set of named overrides (searches expire faster than product lists, policy
//! pages barely move, cart pages never cache).

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration (milliseconds)
const DEFAULT_DATA_TTL_MS: u64 = 15 * 60 * 1000;
const DEFAULT_SEARCH_TTL_MS: u64 = 10 * 60 * 1000;
const DEFAULT_CART_DATA_TTL_MS: u64 = 5 * 60 * 1000;
const DEFAULT_NAVIGATION_TTL_MS: u64 = 30 * 60 * 1000;
const DEFAULT_TEMPLATE_TTL_MS: u64 = 60 * 60 * 1000;
const DEFAULT_PAGE_TTL_MS: u64 = 30 * 60 * 1000;
const DEFAULT_INDEX_PAGE_TTL_MS: u64 = 15 * 60 * 1000;
const DEFAULT_PRODUCT_PAGE_TTL_MS: u64 = 60 * 60 * 1000;
const DEFAULT_COLLECTION_PAGE_TTL_MS: u64 = 45 * 60 * 1000;
const DEFAULT_POLICIES_PAGE_TTL_MS: u64 = 24 * 60 * 60 * 1000;
const DEFAULT_NOT_FOUND_PAGE_TTL_MS: u64 = 24 * 60 * 60 * 1000;
const DEFAULT_DOMAIN_TTL_MS: u64 = 30 * 60 * 1000;
const DEFAULT_DEV_TTL_MS: u64 = 30 * 60 * 1000;

/// Cache tier a TTL lookup belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlTier {
    /// Fetched merchant data (products, collections, navigation).
    Data,
    /// Raw and compiled template sources.
    Template,
    /// Rendered page output.
    Page,
    /// Custom-domain to store resolution.
    Domain,
}

/// Cache configuration from `vetrina.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default TTL for fetched data (ms).
    pub data_ttl_ms: u64,
    /// TTL override for search results (ms).
    pub search_ttl_ms: u64,
    /// TTL override for cart data (ms).
    pub cart_data_ttl_ms: u64,
    /// TTL override for navigation menus (ms).
    pub navigation_ttl_ms: u64,
    /// TTL for raw and compiled templates (ms).
    pub template_ttl_ms: u64,
    /// Default TTL for rendered pages (ms).
    pub page_ttl_ms: u64,
    /// TTL override for the storefront index page (ms).
    pub index_page_ttl_ms: u64,
    /// TTL override for rendered product pages (ms).
    pub product_page_ttl_ms: u64,
    /// TTL override for rendered collection pages (ms).
    pub collection_page_ttl_ms: u64,
    /// TTL override for policy pages (ms).
    pub policies_page_ttl_ms: u64,
    /// TTL override for the rendered 404 page (ms).
    pub not_found_page_ttl_ms: u64,
    /// TTL for domain-to-store resolution (ms).
    pub domain_ttl_ms: u64,
    /// Uniform TTL applied to every tier in development (ms).
    pub dev_ttl_ms: u64,
    /// Run with development cache semantics (uniform TTL, kill switch).
    pub development: bool,
    /// Development-only kill switch; ignored in production.
    pub dev_cache_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_ttl_ms: DEFAULT_DATA_TTL_MS,
            search_ttl_ms: DEFAULT_SEARCH_TTL_MS,
            cart_data_ttl_ms: DEFAULT_CART_DATA_TTL_MS,
            navigation_ttl_ms: DEFAULT_NAVIGATION_TTL_MS,
            template_ttl_ms: DEFAULT_TEMPLATE_TTL_MS,
            page_ttl_ms: DEFAULT_PAGE_TTL_MS,
            index_page_ttl_ms: DEFAULT_INDEX_PAGE_TTL_MS,
            product_page_ttl_ms: DEFAULT_PRODUCT_PAGE_TTL_MS,
            collection_page_ttl_ms: DEFAULT_COLLECTION_PAGE_TTL_MS,
            policies_page_ttl_ms: DEFAULT_POLICIES_PAGE_TTL_MS,
            not_found_page_ttl_ms: DEFAULT_NOT_FOUND_PAGE_TTL_MS,
            domain_ttl_ms: DEFAULT_DOMAIN_TTL_MS,
            dev_ttl_ms: DEFAULT_DEV_TTL_MS,
            development: false,
            dev_cache_enabled: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            data_ttl_ms: settings.data_ttl_ms,
            search_ttl_ms: settings.search_ttl_ms,
            cart_data_ttl_ms: settings.cart_data_ttl_ms,
            navigation_ttl_ms: settings.navigation_ttl_ms,
            template_ttl_ms: settings.template_ttl_ms,
            page_ttl_ms: settings.page_ttl_ms,
            index_page_ttl_ms: settings.index_page_ttl_ms,
            product_page_ttl_ms: settings.product_page_ttl_ms,
            collection_page_ttl_ms: settings.collection_page_ttl_ms,
            policies_page_ttl_ms: settings.policies_page_ttl_ms,
            not_found_page_ttl_ms: settings.not_found_page_ttl_ms,
            domain_ttl_ms: settings.domain_ttl_ms,
            dev_ttl_ms: settings.dev_ttl_ms,
            development: settings.development,
            dev_cache_enabled: settings.dev_cache_enabled,
        }
    }
}

impl CacheConfig {
    /// Resolve the TTL for a tier, applying the named override when one
    /// exists. In development every lookup returns the uniform dev TTL.
    ///
    /// A zero TTL means "never cache"; `CacheStore::set` treats it as a no-op.
    pub fn ttl(&self, tier: TtlTier, kind: Option<&str>) -> Duration {
        if self.development {
            return Duration::from_millis(self.dev_ttl_ms);
        }

        let millis = match tier {
            TtlTier::Data => match kind {
                Some("search") => self.search_ttl_ms,
                Some("cart") => self.cart_data_ttl_ms,
                Some("navigation") => self.navigation_ttl_ms,
                _ => self.data_ttl_ms,
            },
            TtlTier::Template => self.template_ttl_ms,
            TtlTier::Page => match kind {
                Some("index") => self.index_page_ttl_ms,
                Some("product") => self.product_page_ttl_ms,
                Some("collection") => self.collection_page_ttl_ms,
                Some("policies") => self.policies_page_ttl_ms,
                Some("cart") => 0,
                Some("404") => self.not_found_page_ttl_ms,
                _ => self.page_ttl_ms,
            },
            TtlTier::Domain => self.domain_ttl_ms,
        };
        Duration::from_millis(millis)
    }

    pub fn data_ttl(&self, kind: Option<&str>) -> Duration {
        self.ttl(TtlTier::Data, kind)
    }

    pub fn template_ttl(&self) -> Duration {
        self.ttl(TtlTier::Template, None)
    }

    pub fn page_ttl(&self, kind: Option<&str>) -> Duration {
        self.ttl(TtlTier::Page, kind)
    }

    pub fn domain_ttl(&self) -> Duration {
        self.ttl(TtlTier::Domain, None)
    }

    /// True when reads and writes should touch the cache at all.
    ///
    /// Production always caches; development honors the kill switch.
    pub fn should_use_cache(&self, dev_enabled: bool) -> bool {
        if !self.development {
            return true;
        }
        dev_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.data_ttl_ms, 15 * 60 * 1000);
        assert_eq!(config.search_ttl_ms, 10 * 60 * 1000);
        assert_eq!(config.cart_data_ttl_ms, 5 * 60 * 1000);
        assert_eq!(config.navigation_ttl_ms, 30 * 60 * 1000);
        assert_eq!(config.template_ttl_ms, 60 * 60 * 1000);
        assert_eq!(config.page_ttl_ms, 30 * 60 * 1000);
        assert_eq!(config.policies_page_ttl_ms, 24 * 60 * 60 * 1000);
        assert_eq!(config.domain_ttl_ms, 30 * 60 * 1000);
        assert!(!config.development);
        assert!(config.dev_cache_enabled);
    }

    #[test]
    fn data_overrides_apply() {
        let config = CacheConfig::default();
        assert_eq!(
            config.data_ttl(Some("search")),
            Duration::from_millis(10 * 60 * 1000)
        );
        assert_eq!(
            config.data_ttl(Some("navigation")),
            Duration::from_millis(30 * 60 * 1000)
        );
        assert_eq!(
            config.data_ttl(Some("inventory")),
            Duration::from_millis(15 * 60 * 1000)
        );
    }

    #[test]
    fn cart_pages_never_cache() {
        let config = CacheConfig::default();
        assert_eq!(config.page_ttl(Some("cart")), Duration::ZERO);
    }

    #[test]
    fn development_flattens_every_tier() {
        let config = CacheConfig {
            development: true,
            dev_ttl_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(config.data_ttl(Some("search")), Duration::from_millis(1_000));
        assert_eq!(config.template_ttl(), Duration::from_millis(1_000));
        assert_eq!(config.page_ttl(Some("policies")), Duration::from_millis(1_000));
        assert_eq!(config.domain_ttl(), Duration::from_millis(1_000));
    }

    #[test]
    fn production_ignores_the_dev_kill_switch() {
        let config = CacheConfig::default();
        assert!(config.should_use_cache(false));

        let dev = CacheConfig {
            development: true,
            ..Default::default()
        };
        assert!(!dev.should_use_cache(false));
        assert!(dev.should_use_cache(true));
    }
}
