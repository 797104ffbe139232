//! Liquid syntax detection.
//!
//! A declarative table of detectors, one per [`DataRequirement`]: each knows
//! how to recognize its liquid object in template source and how to extract
//! fetch hints (limits, handles) for it. Detection is conservative: an
//! over-detected requirement costs one wasted prefetch, a missed one breaks
//! the render.
//!
//! Three passes run over every template body:
//! 1. object detection (the table below),
//! 2. dependency extraction (`{% section %}`, `{% render %}`, `{% include %}`),
//! 3. pagination analysis (`{% paginate ... by n %}`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::template::{section_storage_key, snippet_storage_key};
use crate::domain::{DataRequirement, LoadOptions, TemplateAnalysis};

const DEFAULT_COLLECTION_PRODUCTS_LIMIT: u32 = 8;
const DEFAULT_RELATED_PRODUCTS_LIMIT: u32 = 4;
const DEFAULT_PAGES_LIMIT: u32 = 10;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| {
            Regex::new($pattern).unwrap_or_else(|err| panic!("invalid detector pattern: {err}"))
        });
    };
}

// Object presence patterns
static_regex!(PRODUCTS_OBJECT, r"\{\{\s*products\s*[|}]");
static_regex!(COLLECTIONS_OBJECT, r"\{\{\s*collections\s*[|}]");
static_regex!(COLLECTION_PRODUCTS, r"collections\.([A-Za-z0-9_-]+)\.products");
static_regex!(PRODUCT_OBJECT, r"\{\{\s*product\.");
static_regex!(COLLECTION_OBJECT, r"\{\{\s*collection\.");
static_regex!(LINKLISTS_OBJECT, r"\{\{\s*linklists\.");
static_regex!(SHOP_OBJECT, r"\{\{\s*shop\.");
static_regex!(PAGES_OBJECT, r"\{\{\s*pages\s*[|}]");
static_regex!(PAGE_OBJECT, r"\{\{\s*page\.");
static_regex!(BLOG_OBJECT, r"\{\{\s*blog\.");
static_regex!(CHECKOUT_OBJECT, r"\{\{\s*checkout\.");
static_regex!(PAGINATE_TAG, r"\{%\s*paginate");
static_regex!(RELATED_PRODUCTS, r"related_products|product\s*\|\s*related");
static_regex!(
    POLICIES_OBJECT,
    r"for\s+item\s+in\s+policies|for\s+policy\s+in\s+policies|\{\{\s*policies\s*[|}]"
);

// Handle extraction
static_regex!(COLLECTION_BRACKET, r#"collections\[['"]([^'"]+)['"]\]"#);
static_regex!(
    COLLECTION_DOT,
    r"collections\.([A-Za-z0-9_-]+)(\.[A-Za-z0-9_])?"
);
static_regex!(PRODUCT_BRACKET, r#"products\[['"]([^'"]+)['"]\]"#);
static_regex!(PAGE_BRACKET, r#"pages\[['"]([^'"]+)['"]\]"#);
static_regex!(PAGE_DOT, r"pages\.([A-Za-z0-9_-]+)(\.[A-Za-z0-9_])?");

// Limit extraction
static_regex!(PRODUCTS_LIMIT, r"(?i)products[^}]*limit:\s*(\d+)");
static_regex!(COLLECTIONS_LIMIT, r"(?i)collections[^}]*limit:\s*(\d+)");
static_regex!(
    COLLECTION_PRODUCTS_LIMIT,
    r"(?i)collections\.([A-Za-z0-9_-]+)\.products[^}]*limit:\s*(\d+)"
);
static_regex!(BARE_LIMIT, r"(?i)limit:\s*(\d+)");
static_regex!(PAGES_LIMIT, r"(?i)pages[^}]*limit:\s*(\d+)");
static_regex!(
    RELATED_PRODUCTS_LIMIT,
    r"(?i)related_products[^}]*limit:\s*(\d+)"
);

// Dependency and pagination tags
static_regex!(SECTION_TAG, r#"\{%\s*section\s+['"]([^'"]+)['"]\s*%\}"#);
static_regex!(SNIPPET_TAG, r#"\{%\s*(?:render|include)\s+['"]([^'"]+)['"]"#);
static_regex!(PAGINATE_EXPR, r"\{%\s*paginate\s+(.+?)\s*%\}");
static_regex!(PAGINATE_BY, r"by\s+(\d+)");

/// One entry in the detection table: present in `content`, or not, with
/// extracted fetch hints when present.
struct ObjectDetector {
    requirement: DataRequirement,
    detect: fn(&str) -> Option<LoadOptions>,
}

static DETECTORS: &[ObjectDetector] = &[
    ObjectDetector {
        requirement: DataRequirement::Products,
        detect: detect_products,
    },
    ObjectDetector {
        requirement: DataRequirement::CollectionProducts,
        detect: detect_collection_products,
    },
    ObjectDetector {
        requirement: DataRequirement::Collections,
        detect: detect_collections,
    },
    ObjectDetector {
        requirement: DataRequirement::SpecificCollection,
        detect: detect_specific_collection,
    },
    ObjectDetector {
        requirement: DataRequirement::SpecificProduct,
        detect: detect_specific_product,
    },
    ObjectDetector {
        requirement: DataRequirement::ProductsByCollection,
        detect: detect_products_by_collection,
    },
    ObjectDetector {
        requirement: DataRequirement::RelatedProducts,
        detect: detect_related_products,
    },
    ObjectDetector {
        requirement: DataRequirement::Product,
        detect: |content| PRODUCT_OBJECT.is_match(content).then(LoadOptions::default),
    },
    ObjectDetector {
        requirement: DataRequirement::Collection,
        detect: |content| COLLECTION_OBJECT.is_match(content).then(LoadOptions::default),
    },
    ObjectDetector {
        requirement: DataRequirement::Linklists,
        detect: |content| LINKLISTS_OBJECT.is_match(content).then(LoadOptions::default),
    },
    ObjectDetector {
        requirement: DataRequirement::Shop,
        detect: |content| SHOP_OBJECT.is_match(content).then(LoadOptions::default),
    },
    ObjectDetector {
        requirement: DataRequirement::SpecificPage,
        detect: detect_specific_page,
    },
    ObjectDetector {
        requirement: DataRequirement::Pages,
        detect: detect_pages,
    },
    ObjectDetector {
        requirement: DataRequirement::Policies,
        detect: |content| POLICIES_OBJECT.is_match(content).then(LoadOptions::default),
    },
    ObjectDetector {
        requirement: DataRequirement::Page,
        detect: detect_page,
    },
    ObjectDetector {
        requirement: DataRequirement::Blog,
        detect: |content| BLOG_OBJECT.is_match(content).then(LoadOptions::default),
    },
    ObjectDetector {
        requirement: DataRequirement::Pagination,
        detect: |content| PAGINATE_TAG.is_match(content).then(LoadOptions::default),
    },
    ObjectDetector {
        requirement: DataRequirement::Checkout,
        detect: |content| CHECKOUT_OBJECT.is_match(content).then(LoadOptions::default),
    },
];

fn capture_limit(pattern: &Regex, content: &str, group: usize) -> Option<u32> {
    pattern
        .captures(content)
        .and_then(|caps| caps.get(group))
        .and_then(|m| m.as_str().parse().ok())
}

fn detect_products(content: &str) -> Option<LoadOptions> {
    PRODUCTS_OBJECT.is_match(content).then(|| LoadOptions {
        limit: capture_limit(&PRODUCTS_LIMIT, content, 1),
        ..LoadOptions::default()
    })
}

fn detect_collections(content: &str) -> Option<LoadOptions> {
    COLLECTIONS_OBJECT.is_match(content).then(|| LoadOptions {
        limit: capture_limit(&COLLECTIONS_LIMIT, content, 1),
        ..LoadOptions::default()
    })
}

fn detect_collection_products(content: &str) -> Option<LoadOptions> {
    if !COLLECTION_PRODUCTS.is_match(content) {
        return None;
    }
    if let Some(caps) = COLLECTION_PRODUCTS_LIMIT.captures(content) {
        let limit = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return Some(LoadOptions {
            collection_handle: caps.get(1).map(|m| m.as_str().to_string()),
            limit,
            ..LoadOptions::default()
        });
    }
    let handle = COLLECTION_PRODUCTS
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    Some(LoadOptions {
        collection_handle: handle,
        limit: Some(DEFAULT_COLLECTION_PRODUCTS_LIMIT),
        ..LoadOptions::default()
    })
}

/// Dot-access handles, skipping property chains: `collections.featured`
/// names a collection, `collections.featured.products` does not name the
/// handle "featured" here (the chain detectors own it).
fn dot_handles(pattern: &Regex, content: &str) -> Vec<String> {
    pattern
        .captures_iter(content)
        .filter_map(|caps| {
            if caps.get(2).is_some() {
                return None;
            }
            caps.get(1).map(|m| m.as_str().to_string())
        })
        .collect()
}

fn detect_specific_collection(content: &str) -> Option<LoadOptions> {
    let mut options = LoadOptions::default();
    for caps in COLLECTION_BRACKET.captures_iter(content) {
        if let Some(handle) = caps.get(1) {
            options.handles.insert(handle.as_str().to_string());
        }
    }
    options.handles.extend(dot_handles(&COLLECTION_DOT, content));
    (!options.handles.is_empty()).then_some(options)
}

fn detect_specific_product(content: &str) -> Option<LoadOptions> {
    let mut options = LoadOptions::default();
    for caps in PRODUCT_BRACKET.captures_iter(content) {
        if let Some(handle) = caps.get(1) {
            options.handles.insert(handle.as_str().to_string());
        }
    }
    (!options.handles.is_empty()).then_some(options)
}

fn detect_products_by_collection(content: &str) -> Option<LoadOptions> {
    if !COLLECTION_PRODUCTS.is_match(content) {
        return None;
    }
    let mut options = LoadOptions {
        limit: Some(capture_limit(&BARE_LIMIT, content, 1).unwrap_or(DEFAULT_COLLECTION_PRODUCTS_LIMIT)),
        ..LoadOptions::default()
    };
    for caps in COLLECTION_PRODUCTS.captures_iter(content) {
        if let Some(handle) = caps.get(1) {
            options.handles.insert(handle.as_str().to_string());
        }
    }
    Some(options)
}

fn detect_related_products(content: &str) -> Option<LoadOptions> {
    RELATED_PRODUCTS.is_match(content).then(|| LoadOptions {
        limit: Some(
            capture_limit(&RELATED_PRODUCTS_LIMIT, content, 1)
                .unwrap_or(DEFAULT_RELATED_PRODUCTS_LIMIT),
        ),
        ..LoadOptions::default()
    })
}

fn page_handles(content: &str) -> LoadOptions {
    let mut options = LoadOptions::default();
    for caps in PAGE_BRACKET.captures_iter(content) {
        if let Some(handle) = caps.get(1) {
            options.handles.insert(handle.as_str().to_string());
        }
    }
    options.handles.extend(dot_handles(&PAGE_DOT, content));
    options
}

fn detect_specific_page(content: &str) -> Option<LoadOptions> {
    let options = page_handles(content);
    (!options.handles.is_empty()).then_some(options)
}

fn detect_page(content: &str) -> Option<LoadOptions> {
    PAGE_OBJECT.is_match(content).then(|| page_handles(content))
}

fn detect_pages(content: &str) -> Option<LoadOptions> {
    PAGES_OBJECT.is_match(content).then(|| LoadOptions {
        limit: Some(capture_limit(&PAGES_LIMIT, content, 1).unwrap_or(DEFAULT_PAGES_LIMIT)),
        ..LoadOptions::default()
    })
}

/// Static analyzer for liquid template source.
pub struct LiquidSyntaxDetector;

impl LiquidSyntaxDetector {
    /// Run all three passes over `content` and return the full analysis.
    pub fn analyze(content: &str) -> TemplateAnalysis {
        let mut analysis = TemplateAnalysis::new();
        Self::detect_liquid_objects(content, &mut analysis);
        Self::detect_dependencies(content, &mut analysis);
        Self::detect_pagination(content, &mut analysis);
        analysis
    }

    /// Pass 1: walk the detector table and record every requirement present.
    pub fn detect_liquid_objects(content: &str, analysis: &mut TemplateAnalysis) {
        for detector in DETECTORS {
            if let Some(options) = (detector.detect)(content) {
                analysis.insert_requirement(detector.requirement, options);
            }
        }
    }

    /// Pass 2: record `{% section %}` and `{% render %}`/`{% include %}`
    /// references as template dependencies.
    pub fn detect_dependencies(content: &str, analysis: &mut TemplateAnalysis) {
        for caps in SECTION_TAG.captures_iter(content) {
            if let Some(name) = caps.get(1) {
                analysis.add_used_section(name.as_str());
                analysis.add_dependency(section_storage_key(name.as_str()));
            }
        }
        for caps in SNIPPET_TAG.captures_iter(content) {
            if let Some(name) = caps.get(1) {
                analysis.add_dependency(snippet_storage_key(name.as_str()));
            }
        }
    }

    /// Pass 3: `{% paginate expr by n %}` forces the paginated base objects
    /// into the requirements so page one is always fetchable.
    pub fn detect_pagination(content: &str, analysis: &mut TemplateAnalysis) {
        let Some(caps) = PAGINATE_EXPR.captures(content) else {
            return;
        };
        analysis.has_pagination = true;

        let expression = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let paginated_object = expression
            .split(" by ")
            .next()
            .unwrap_or(expression)
            .trim();

        if paginated_object.contains("products") {
            analysis.insert_requirement(DataRequirement::Products, LoadOptions::default());
        }
        if paginated_object.contains("collections") {
            analysis.insert_requirement(DataRequirement::Collections, LoadOptions::default());
        }

        let page_size = capture_limit(&PAGINATE_BY, expression, 1);
        analysis.insert_requirement(
            DataRequirement::Pagination,
            LoadOptions {
                limit: page_size,
                ..LoadOptions::default()
            },
        );
    }
}
