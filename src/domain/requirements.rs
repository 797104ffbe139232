//! Data requirements extracted from template source.
//!
//! A `TemplateAnalysis` is the static summary of a liquid template: which
//! liquid objects it references, which merchant data must be prefetched
//! before rendering, and which other templates it pulls in. Analyses are
//! value objects; deterministic container types keep equal inputs producing
//! byte-equal results.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Merchant data a template needs before it can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRequirement {
    Products,
    CollectionProducts,
    Collections,
    SpecificCollection,
    SpecificProduct,
    ProductsByCollection,
    RelatedProducts,
    Product,
    Collection,
    Linklists,
    Shop,
    Pages,
    SpecificPage,
    Page,
    Policies,
    Blog,
    Pagination,
    Checkout,
}

impl DataRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataRequirement::Products => "products",
            DataRequirement::CollectionProducts => "collection_products",
            DataRequirement::Collections => "collections",
            DataRequirement::SpecificCollection => "specific_collection",
            DataRequirement::SpecificProduct => "specific_product",
            DataRequirement::ProductsByCollection => "products_by_collection",
            DataRequirement::RelatedProducts => "related_products",
            DataRequirement::Product => "product",
            DataRequirement::Collection => "collection",
            DataRequirement::Linklists => "linklists",
            DataRequirement::Shop => "shop",
            DataRequirement::Pages => "pages",
            DataRequirement::SpecificPage => "specific_page",
            DataRequirement::Page => "page",
            DataRequirement::Policies => "policies",
            DataRequirement::Blog => "blog",
            DataRequirement::Pagination => "pagination",
            DataRequirement::Checkout => "checkout",
        }
    }
}

/// Fetch hints attached to a data requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Item budget for list fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Specific handles named in the template (products["x"], pages.about).
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub handles: BTreeSet<String>,
    /// Owning collection for scoped product fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_handle: Option<String>,
}

impl LoadOptions {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_handle(handle: impl Into<String>) -> Self {
        let mut handles = BTreeSet::new();
        handles.insert(handle.into());
        Self {
            handles,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.handles.is_empty() && self.collection_handle.is_none()
    }

    /// Fold another extraction for the same requirement into this one.
    ///
    /// The first observed limit wins; handle sets union.
    pub fn merge(&mut self, other: LoadOptions) {
        if self.limit.is_none() {
            self.limit = other.limit;
        }
        self.handles.extend(other.handles);
        if self.collection_handle.is_none() {
            self.collection_handle = other.collection_handle;
        }
    }
}

/// Static analysis of a single template body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateAnalysis {
    /// Liquid object names seen in the source (`product`, `collections`, ...).
    pub liquid_objects: BTreeSet<String>,
    /// Data to prefetch, keyed by requirement, with fetch hints.
    pub required_data: BTreeMap<DataRequirement, LoadOptions>,
    /// Storage keys of templates this one includes, in first-seen order.
    pub dependencies: Vec<String>,
    /// Section names referenced via `{% section %}`, in first-seen order.
    pub used_sections: Vec<String>,
    /// True when the body contains a `{% paginate %}` block.
    pub has_pagination: bool,
}

impl TemplateAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requires(&self, requirement: DataRequirement) -> bool {
        self.required_data.contains_key(&requirement)
    }

    pub fn options_for(&self, requirement: DataRequirement) -> Option<&LoadOptions> {
        self.required_data.get(&requirement)
    }

    /// Record a requirement, merging options if it was already present.
    ///
    /// Repeated detections of the same requirement never produce duplicate
    /// entries; they enrich the existing one.
    pub fn insert_requirement(&mut self, requirement: DataRequirement, options: LoadOptions) {
        self.liquid_objects.insert(requirement.as_str().to_string());
        self.required_data
            .entry(requirement)
            .and_modify(|existing| existing.merge(options.clone()))
            .or_insert(options);
    }

    pub fn add_dependency(&mut self, storage_key: impl Into<String>) {
        let storage_key = storage_key.into();
        if !self.dependencies.contains(&storage_key) {
            self.dependencies.push(storage_key);
        }
    }

    pub fn add_used_section(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.used_sections.contains(&name) {
            self.used_sections.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_requirement_merges_instead_of_duplicating() {
        let mut analysis = TemplateAnalysis::new();
        analysis.insert_requirement(DataRequirement::Products, LoadOptions::with_limit(8));
        analysis.insert_requirement(DataRequirement::Products, LoadOptions::with_handle("hat"));

        assert_eq!(analysis.required_data.len(), 1);
        let options = analysis
            .options_for(DataRequirement::Products)
            .expect("merged options");
        assert_eq!(options.limit, Some(8));
        assert!(options.handles.contains("hat"));
    }

    #[test]
    fn first_limit_wins_on_merge() {
        let mut options = LoadOptions::with_limit(4);
        options.merge(LoadOptions::with_limit(12));
        assert_eq!(options.limit, Some(4));
    }

    #[test]
    fn dependencies_keep_first_seen_order_without_duplicates() {
        let mut analysis = TemplateAnalysis::new();
        analysis.add_dependency("snippets/price.liquid");
        analysis.add_dependency("snippets/badge.liquid");
        analysis.add_dependency("snippets/price.liquid");

        assert_eq!(
            analysis.dependencies,
            vec!["snippets/price.liquid", "snippets/badge.liquid"]
        );
    }

    #[test]
    fn equal_inputs_serialize_identically() {
        let mut left = TemplateAnalysis::new();
        let mut right = TemplateAnalysis::new();
        for analysis in [&mut left, &mut right] {
            analysis.insert_requirement(DataRequirement::Shop, LoadOptions::default());
            analysis.insert_requirement(DataRequirement::Product, LoadOptions::default());
        }

        let left_json = serde_json::to_string(&left).expect("serialize");
        let right_json = serde_json::to_string(&right).expect("serialize");
        assert_eq!(left_json, right_json);
    }
}
