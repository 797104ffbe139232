//! Cache key generation.
//!
//! Every key embeds the owning `store_id` immediately after its literal
//! prefix, so store-scoped invalidation can always be expressed as
//! "delete everything starting with `{prefix}{store_id}_`" without touching
//! other tenants. These functions are the single source of truth for key
//! shapes; nothing else in the crate formats a cache key by hand.

/// Key for a raw template body, keyed by its storage key.
pub fn template(store_id: &str, storage_key: &str) -> String {
    format!("template_{store_id}_{storage_key}")
}

/// Key for a compiled template, keyed by its storage key.
pub fn compiled_template(store_id: &str, storage_key: &str) -> String {
    format!("compiled_template_{store_id}_{storage_key}")
}

/// Key for a cached theme asset (stored base64-encoded).
pub fn asset(store_id: &str, asset_path: &str) -> String {
    format!("asset_{store_id}_{asset_path}")
}

/// Key for the static analysis of a template body.
pub fn analysis(store_id: &str, storage_key: &str) -> String {
    format!("analysis_{store_id}_{storage_key}")
}

/// Key for one product record.
pub fn product(store_id: &str, product_id: &str) -> String {
    format!("product_{store_id}_{product_id}")
}

/// Key for one page of the product listing.
pub fn products(store_id: &str, limit: u32, next_token: Option<&str>) -> String {
    format!(
        "products_{store_id}_{limit}_{}",
        next_token.unwrap_or("first")
    )
}

/// Key for the featured-products list at a given size.
pub fn featured_products(store_id: &str, limit: u32) -> String {
    format!("featured_products_{store_id}_{limit}")
}

/// Key for the handle-to-id map used by product URL resolution.
pub fn product_handle_map(store_id: &str) -> String {
    format!("product_handle_map_{store_id}")
}

/// Key for one product search result set.
pub fn search_products(store_id: &str, query: &str, limit: u32) -> String {
    format!("search_products_{store_id}_{query}_{limit}")
}

/// Key for one collection record.
pub fn collection(store_id: &str, collection_id: &str) -> String {
    format!("collection_{store_id}_{collection_id}")
}

/// Key for one page of the collection listing.
pub fn collections(store_id: &str, limit: u32, next_token: Option<&str>) -> String {
    format!(
        "collections_{store_id}_{limit}_{}",
        next_token.unwrap_or("first")
    )
}

/// Key for one page record.
pub fn page(store_id: &str, page_id: &str) -> String {
    format!("page_{store_id}_{page_id}")
}

/// Key for the store's page listing.
pub fn pages(store_id: &str) -> String {
    format!("pages_{store_id}")
}

/// Key for one cart (cart data is never actually cached; see `CacheConfig`).
pub fn cart(store_id: &str, cart_id: &str) -> String {
    format!("cart_{store_id}_{cart_id}")
}

/// Key for custom-domain resolution. Keyed by domain, not store.
pub fn domain(domain_name: &str) -> String {
    format!("domain_{domain_name}")
}

// ============================================================================
// Store-scoped prefixes for invalidation
// ============================================================================

pub fn templates_prefix(store_id: &str) -> String {
    format!("template_{store_id}_")
}

pub fn compiled_templates_prefix(store_id: &str) -> String {
    format!("compiled_template_{store_id}_")
}

pub fn assets_prefix(store_id: &str) -> String {
    format!("asset_{store_id}_")
}

pub fn analyses_prefix(store_id: &str) -> String {
    format!("analysis_{store_id}_")
}

/// Prefix covering individual product records for a store.
pub fn product_records_prefix(store_id: &str) -> String {
    format!("product_{store_id}_")
}

pub fn products_prefix(store_id: &str) -> String {
    format!("products_{store_id}_")
}

pub fn featured_products_prefix(store_id: &str) -> String {
    format!("featured_products_{store_id}_")
}

pub fn search_products_prefix(store_id: &str) -> String {
    format!("search_products_{store_id}_")
}

/// Prefix covering one collection and everything derived from it.
pub fn collection_prefix(store_id: &str, collection_id: &str) -> String {
    format!("collection_{store_id}_{collection_id}")
}

pub fn all_collections_prefix(store_id: &str) -> String {
    format!("collection_{store_id}_")
}

pub fn collections_prefix(store_id: &str) -> String {
    format!("collections_{store_id}_")
}

/// Prefix covering page records and rendered page output for a store.
pub fn pages_prefix(store_id: &str) -> String {
    format!("page_{store_id}_")
}

/// Prefix covering rendered pages of one kind (`product`, `collection`).
///
/// Rendered page keys look like `page_{store}_{kind}|{path}`, so invalidating
/// every rendered product page is a prefix delete on `page_{store}_product|`.
pub fn rendered_pages_prefix(store_id: &str, page_kind: &str) -> String {
    format!("page_{store_id}_{page_kind}|")
}

pub fn navigation_prefix(store_id: &str) -> String {
    format!("navigation_{store_id}_")
}

pub fn navigation_menu_prefix(store_id: &str) -> String {
    format!("navigation_menu_{store_id}_")
}

/// Fragment present in every key owned by a store, for whole-store sweeps.
pub fn store_scope_fragment(store_id: &str) -> String {
    format!("_{store_id}_")
}
