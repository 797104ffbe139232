//! Template storage-key resolution.
//!
//! All theme files for a store live under a single origin prefix,
//! `templates/{store_id}/...`. These pure functions are the only place that
//! prefix is spelled out; the loader, the invalidation service, and the edge
//! purger all go through them.

/// Root prefix for theme files in the origin bucket/CDN.
pub const TEMPLATE_ROOT: &str = "templates";

const LIQUID_EXT: &str = ".liquid";
const JSON_EXT: &str = ".json";

/// Resolve a caller-facing template name to its storage key.
///
/// Path-like names (`layout/theme.liquid`, `snippets/price`) are kept under
/// the store root, gaining a `.liquid` extension when they carry none. Bare
/// names are assumed to be sections: `cart` becomes
/// `sections/cart.liquid`.
pub fn resolve_storage_key(store_id: &str, template_name: &str) -> String {
    if template_name.contains('/') {
        if template_name.ends_with(LIQUID_EXT) || template_name.ends_with(JSON_EXT) {
            return format!("{TEMPLATE_ROOT}/{store_id}/{template_name}");
        }
        return format!("{TEMPLATE_ROOT}/{store_id}/{template_name}{LIQUID_EXT}");
    }
    if template_name.ends_with(JSON_EXT) {
        return format!("{TEMPLATE_ROOT}/{store_id}/sections/{template_name}");
    }
    format!("{TEMPLATE_ROOT}/{store_id}/sections/{template_name}{LIQUID_EXT}")
}

/// Storage key for a theme asset (images, fonts, css) under the store root.
pub fn asset_storage_key(store_id: &str, asset_path: &str) -> String {
    format!("{TEMPLATE_ROOT}/{store_id}/assets/{asset_path}")
}

/// Storage key for a section template referenced by bare name.
pub fn section_storage_key(section_name: &str) -> String {
    format!("sections/{section_name}{LIQUID_EXT}")
}

/// Storage key for a snippet referenced from `{% render %}` / `{% include %}`.
pub fn snippet_storage_key(snippet_name: &str) -> String {
    format!("snippets/{snippet_name}{LIQUID_EXT}")
}

/// Edge purge path for one template, or the store's whole template tree.
pub fn edge_purge_path(store_id: &str, template_path: Option<&str>) -> String {
    match template_path {
        Some(path) => format!("/{TEMPLATE_ROOT}/{store_id}/{path}"),
        None => format!("/{TEMPLATE_ROOT}/{store_id}/*"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_resolves_to_section() {
        assert_eq!(
            resolve_storage_key("s1", "cart"),
            "templates/s1/sections/cart.liquid"
        );
    }

    #[test]
    fn path_with_extension_is_kept_verbatim() {
        assert_eq!(
            resolve_storage_key("s1", "layout/theme.liquid"),
            "templates/s1/layout/theme.liquid"
        );
        assert_eq!(
            resolve_storage_key("s1", "templates/index.json"),
            "templates/s1/templates/index.json"
        );
    }

    #[test]
    fn path_without_extension_gains_liquid_suffix() {
        assert_eq!(
            resolve_storage_key("s1", "snippets/price"),
            "templates/s1/snippets/price.liquid"
        );
    }

    #[test]
    fn bare_json_name_keeps_its_extension() {
        assert_eq!(
            resolve_storage_key("s1", "header-group.json"),
            "templates/s1/sections/header-group.json"
        );
    }

    #[test]
    fn asset_keys_live_under_the_store_root() {
        assert_eq!(
            asset_storage_key("s1", "fonts/inter.woff2"),
            "templates/s1/assets/fonts/inter.woff2"
        );
    }

    #[test]
    fn purge_paths_cover_one_file_or_the_whole_store() {
        assert_eq!(
            edge_purge_path("s1", Some("sections/cart.liquid")),
            "/templates/s1/sections/cart.liquid"
        );
        assert_eq!(edge_purge_path("s1", None), "/templates/s1/*");
    }
}
