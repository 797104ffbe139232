//! Change-driven cache invalidation.
//!
//! Each `ChangeType` maps, through a static rule table, to the key patterns
//! it dirties. Invalidation is two-phase: pattern-level prefix deletes
//! (always store-scoped), then entity-specific key deletes when an entity id
//! is known. An edge purge follows, best-effort only; a failed purge never
//! fails the invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::domain::ChangeType;
use crate::domain::template::edge_purge_path;
use crate::infra::edge::EdgeCache;

use super::keys;
use super::store::CacheStore;

pub(crate) const METRIC_INVALIDATION_RUNS: &str = "vetrina_invalidation_total";
pub(crate) const METRIC_PURGE_FAILED: &str = "vetrina_edge_purge_failed_total";

/// A family of cache keys a change can dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPattern {
    /// Individual product records.
    Product,
    /// Product list pages.
    Products,
    FeaturedProducts,
    SearchProducts,
    /// One collection (entity-scoped) or all of a store's collections.
    Collection,
    /// Collection list pages.
    Collections,
    /// One page record, or all page records and rendered pages.
    Page,
    /// The store's page listing.
    Pages,
    /// Navigation menus, plus the rendered pages built from them.
    Navigation,
    /// Raw template sources, plus rendered pages.
    Template,
    /// Compiled templates, plus rendered pages.
    CompiledTemplate,
    /// Domain resolution entries; handled at the entity level only.
    Domain,
}

/// What to invalidate for one change type.
#[derive(Debug, Clone)]
pub struct InvalidationRule {
    pub patterns: &'static [KeyPattern],
    pub purges_edge: bool,
    pub summary: &'static str,
}

static RULES: Lazy<HashMap<ChangeType, InvalidationRule>> = Lazy::new(|| {
    use KeyPattern::*;

    let mut rules = HashMap::new();
    let mut rule = |change: ChangeType, patterns: &'static [KeyPattern], summary: &'static str| {
        rules.insert(
            change,
            InvalidationRule {
                patterns,
                purges_edge: true,
                summary,
            },
        );
    };

    rule(
        ChangeType::ProductCreated,
        &[Products, FeaturedProducts, SearchProducts, Collection],
        "product created: drop lists and searches",
    );
    rule(
        ChangeType::ProductUpdated,
        &[Product, Products, FeaturedProducts, SearchProducts, Collection],
        "product updated: drop record, lists and searches",
    );
    rule(
        ChangeType::ProductDeleted,
        &[Product, Products, FeaturedProducts, SearchProducts, Collection],
        "product deleted: drop record, lists and searches",
    );
    rule(
        ChangeType::CollectionCreated,
        &[Collections, Navigation],
        "collection created: drop lists and navigation",
    );
    rule(
        ChangeType::CollectionUpdated,
        &[Collection, Collections, Navigation],
        "collection updated: drop record, lists and navigation",
    );
    rule(
        ChangeType::CollectionDeleted,
        &[Collection, Collections, Navigation],
        "collection deleted: drop record, lists and navigation",
    );
    rule(
        ChangeType::PageCreated,
        &[Pages, Navigation],
        "page created: drop listing and navigation",
    );
    rule(
        ChangeType::PageUpdated,
        &[Page, Pages, Navigation],
        "page updated: drop record, listing and navigation",
    );
    rule(
        ChangeType::PageDeleted,
        &[Page, Pages, Navigation],
        "page deleted: drop record, listing and navigation",
    );
    rule(
        ChangeType::NavigationUpdated,
        &[Navigation],
        "navigation updated: drop menus and rendered pages",
    );
    rule(
        ChangeType::TemplateUpdated,
        &[Template, CompiledTemplate],
        "template updated: drop sources, compiles and rendered pages",
    );
    rule(
        ChangeType::StoreSettingsUpdated,
        &[Domain, Navigation],
        "store settings updated: drop domains and navigation",
    );
    rule(
        ChangeType::DomainUpdated,
        &[Domain],
        "domain updated: drop domain resolution",
    );
    rule(
        ChangeType::TemplateStoreUpdated,
        &[Template, CompiledTemplate],
        "store theme updated: drop sources, compiles and rendered pages",
    );
    rules
});

/// Look up the invalidation rule for a change type. Total over `ChangeType`.
pub fn rule_for(change: ChangeType) -> &'static InvalidationRule {
    RULES
        .get(&change)
        .unwrap_or_else(|| unreachable!("rule table covers every change type"))
}

/// Applies the invalidation rules against the local store and the edge.
pub struct CacheInvalidationService {
    store: Arc<CacheStore>,
    edge: Option<Arc<dyn EdgeCache>>,
}

impl CacheInvalidationService {
    pub fn new(store: Arc<CacheStore>, edge: Option<Arc<dyn EdgeCache>>) -> Self {
        Self { store, edge }
    }

    /// Invalidate everything a change dirties.
    ///
    /// `template_path` narrows the edge purge to one file for template
    /// changes; without it the store's whole template tree is purged.
    pub async fn invalidate(
        &self,
        change: ChangeType,
        store_id: &str,
        entity_id: Option<&str>,
        template_path: Option<&str>,
    ) {
        let rule = rule_for(change);
        counter!(METRIC_INVALIDATION_RUNS).increment(1);
        info!(change = %change, store_id, entity_id, summary = rule.summary, "Invalidating cache");

        self.apply_patterns(rule.patterns, store_id, entity_id);
        if let Some(entity_id) = entity_id {
            self.delete_specific_keys(change, store_id, entity_id);
        }

        if rule.purges_edge {
            self.purge_edge(store_id, template_path).await;
        }
    }

    /// Invalidate from a raw wire value. Unknown change types are logged
    /// and ignored so one malformed event cannot wedge the event stream.
    pub async fn invalidate_raw(
        &self,
        change: &str,
        store_id: &str,
        entity_id: Option<&str>,
        template_path: Option<&str>,
    ) {
        match change.parse::<ChangeType>() {
            Ok(change) => {
                self.invalidate(change, store_id, entity_id, template_path)
                    .await;
            }
            Err(_) => {
                warn!(change, store_id, "Unknown change type; skipping invalidation");
            }
        }
    }

    /// Drop every cached key owned by a store.
    pub fn invalidate_store_cache(&self, store_id: &str) {
        let mut removed = self
            .store
            .delete_containing(&keys::store_scope_fragment(store_id));
        // The page listing key ends with the bare store id and carries no
        // trailing fragment; it needs its own deletion.
        if self.store.delete_key(&keys::pages(store_id)) {
            removed += 1;
        }
        info!(store_id, removed, "Invalidated all cache for store");
    }

    fn apply_patterns(&self, patterns: &[KeyPattern], store_id: &str, entity_id: Option<&str>) {
        for pattern in patterns {
            match pattern {
                KeyPattern::Product => {
                    self.store
                        .delete_by_prefix(&keys::product_records_prefix(store_id));
                }
                KeyPattern::Products => {
                    self.store.delete_by_prefix(&keys::products_prefix(store_id));
                }
                KeyPattern::FeaturedProducts => {
                    self.store
                        .delete_by_prefix(&keys::featured_products_prefix(store_id));
                }
                KeyPattern::SearchProducts => {
                    self.store
                        .delete_by_prefix(&keys::search_products_prefix(store_id));
                }
                KeyPattern::Collection => match entity_id {
                    Some(collection_id) => {
                        self.store
                            .delete_by_prefix(&keys::collection_prefix(store_id, collection_id));
                    }
                    None => {
                        self.store
                            .delete_by_prefix(&keys::all_collections_prefix(store_id));
                    }
                },
                KeyPattern::Collections => {
                    self.store
                        .delete_by_prefix(&keys::collections_prefix(store_id));
                }
                KeyPattern::Pages => {
                    self.store.delete_key(&keys::pages(store_id));
                }
                KeyPattern::Page => match entity_id {
                    Some(page_id) => {
                        self.store.delete_key(&keys::page(store_id, page_id));
                    }
                    None => {
                        self.store.delete_by_prefix(&keys::pages_prefix(store_id));
                    }
                },
                KeyPattern::Navigation => {
                    self.store
                        .delete_by_prefix(&keys::navigation_prefix(store_id));
                    self.store
                        .delete_by_prefix(&keys::navigation_menu_prefix(store_id));
                    // Menus feed into every rendered page.
                    self.store.delete_by_prefix(&keys::pages_prefix(store_id));
                }
                KeyPattern::Template => {
                    self.store
                        .delete_by_prefix(&keys::templates_prefix(store_id));
                    self.store
                        .delete_by_prefix(&keys::analyses_prefix(store_id));
                    self.store.delete_by_prefix(&keys::pages_prefix(store_id));
                }
                KeyPattern::CompiledTemplate => {
                    self.store
                        .delete_by_prefix(&keys::compiled_templates_prefix(store_id));
                    self.store.delete_by_prefix(&keys::pages_prefix(store_id));
                }
                // Domain keys are keyed by domain name, not store; only the
                // entity-level path can target them.
                KeyPattern::Domain => {}
            }
        }
    }

    fn delete_specific_keys(&self, change: ChangeType, store_id: &str, entity_id: &str) {
        match change {
            ChangeType::ProductUpdated | ChangeType::ProductDeleted => {
                self.store.delete_key(&keys::product(store_id, entity_id));
                self.store.delete_by_prefix(&keys::products_prefix(store_id));
                self.store
                    .delete_by_prefix(&keys::featured_products_prefix(store_id));
                self.store
                    .delete_by_prefix(&keys::rendered_pages_prefix(store_id, "product"));
                // Force the handle map to be rebuilt on next read.
                self.store.delete_key(&keys::product_handle_map(store_id));
            }
            ChangeType::CollectionUpdated | ChangeType::CollectionDeleted => {
                self.store
                    .delete_by_prefix(&keys::collection_prefix(store_id, entity_id));
                self.store
                    .delete_by_prefix(&keys::collections_prefix(store_id));
                self.store
                    .delete_by_prefix(&keys::rendered_pages_prefix(store_id, "collection"));
            }
            ChangeType::PageUpdated | ChangeType::PageDeleted => {
                self.store.delete_key(&keys::page(store_id, entity_id));
                self.store.delete_key(&keys::pages(store_id));
            }
            ChangeType::DomainUpdated => {
                self.store.delete_key(&keys::domain(entity_id));
            }
            _ => {}
        }
    }

    async fn purge_edge(&self, store_id: &str, template_path: Option<&str>) {
        let Some(edge) = &self.edge else {
            debug!(store_id, "No edge cache configured; skipping purge");
            return;
        };
        let path = edge_purge_path(store_id, template_path);
        if let Err(err) = edge.purge(&path).await {
            counter!(METRIC_PURGE_FAILED).increment(1);
            warn!(store_id, path, error = %err, "Edge purge failed; local invalidation already applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::config::CacheConfig;
    use super::super::store::CacheValue;
    use super::*;

    fn seeded_store() -> Arc<CacheStore> {
        let store = Arc::new(CacheStore::new(CacheConfig::default()));
        let ttl = Duration::from_secs(3600);
        store.set(keys::product("s1", "p1"), CacheValue::text("p"), ttl);
        store.set(keys::products("s1", 20, None), CacheValue::text("pl"), ttl);
        store.set(keys::featured_products("s1", 8), CacheValue::text("fp"), ttl);
        store.set(keys::page("s1", "about"), CacheValue::text("pg"), ttl);
        store.set(keys::pages("s1"), CacheValue::text("pgl"), ttl);
        store.set(
            format!("{}main", keys::navigation_menu_prefix("s1")),
            CacheValue::text("nav"),
            ttl,
        );
        store.set(
            keys::template("s1", "templates/s1/sections/cart.liquid"),
            CacheValue::text("tpl"),
            ttl,
        );
        store.set(keys::product("s2", "p9"), CacheValue::text("other"), ttl);
        store
    }

    fn service(store: Arc<CacheStore>) -> CacheInvalidationService {
        CacheInvalidationService::new(store, None)
    }

    #[test]
    fn rule_table_covers_every_change_type() {
        for change in ChangeType::ALL {
            let rule = rule_for(change);
            assert!(!rule.summary.is_empty());
        }
    }

    #[tokio::test]
    async fn page_deleted_scopes_to_page_keys() {
        let store = seeded_store();
        let service = service(Arc::clone(&store));

        service
            .invalidate(ChangeType::PageDeleted, "s1", Some("about"), None)
            .await;

        assert!(store.get(&keys::page("s1", "about")).is_none());
        assert!(store.get(&keys::pages("s1")).is_none());
        assert!(store
            .get(&format!("{}main", keys::navigation_menu_prefix("s1")))
            .is_none());
        // Product and template keys are untouched.
        assert!(store.get(&keys::product("s1", "p1")).is_some());
        assert!(store
            .get(&keys::template("s1", "templates/s1/sections/cart.liquid"))
            .is_some());
    }

    #[tokio::test]
    async fn product_updated_drops_record_lists_and_handle_map() {
        let store = seeded_store();
        store.set(
            keys::product_handle_map("s1"),
            CacheValue::text("map"),
            Duration::from_secs(3600),
        );
        let service = service(Arc::clone(&store));

        service
            .invalidate(ChangeType::ProductUpdated, "s1", Some("p1"), None)
            .await;

        assert!(store.get(&keys::product("s1", "p1")).is_none());
        assert!(store.get(&keys::products("s1", 20, None)).is_none());
        assert!(store.get(&keys::featured_products("s1", 8)).is_none());
        assert!(store.get(&keys::product_handle_map("s1")).is_none());
        // Another store's product survives.
        assert!(store.get(&keys::product("s2", "p9")).is_some());
    }

    #[tokio::test]
    async fn template_updated_drops_sources_analyses_and_rendered_pages() {
        let store = seeded_store();
        store.set(
            keys::analysis("s1", "templates/s1/sections/cart.liquid"),
            CacheValue::text("an"),
            Duration::from_secs(3600),
        );
        let service = service(Arc::clone(&store));

        service
            .invalidate(ChangeType::TemplateUpdated, "s1", None, None)
            .await;

        assert!(store
            .get(&keys::template("s1", "templates/s1/sections/cart.liquid"))
            .is_none());
        assert!(store
            .get(&keys::analysis("s1", "templates/s1/sections/cart.liquid"))
            .is_none());
        assert!(store.get(&keys::page("s1", "about")).is_none());
        assert!(store.get(&keys::product("s1", "p1")).is_some());
    }

    #[tokio::test]
    async fn domain_updated_touches_only_the_domain_key() {
        let store = seeded_store();
        store.set(
            keys::domain("shop.example.com"),
            CacheValue::text("s1"),
            Duration::from_secs(3600),
        );
        let service = service(Arc::clone(&store));

        service
            .invalidate(ChangeType::DomainUpdated, "s1", Some("shop.example.com"), None)
            .await;

        assert!(store.get(&keys::domain("shop.example.com")).is_none());
        assert!(store.get(&keys::product("s1", "p1")).is_some());
        assert!(store.get(&keys::page("s1", "about")).is_some());
    }

    #[tokio::test]
    async fn unknown_raw_change_type_is_a_no_op() {
        let store = seeded_store();
        let before = store.len();
        let service = service(Arc::clone(&store));

        service
            .invalidate_raw("warehouse_audited", "s1", Some("p1"), None)
            .await;

        assert_eq!(store.len(), before);
    }

    #[test]
    fn store_sweep_leaves_other_tenants_alone() {
        let store = seeded_store();
        let service = service(Arc::clone(&store));

        service.invalidate_store_cache("s1");

        assert!(store.get(&keys::product("s1", "p1")).is_none());
        assert!(store.get(&keys::product("s2", "p9")).is_some());
    }
}
