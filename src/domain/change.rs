//! Store change events.
//!
//! A `ChangeType` names a mutation in the merchant's data or theme that the
//! invalidation service must react to. The set is closed: unrecognized values
//! coming off the wire are rejected at the boundary so the rule table can
//! stay exhaustive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// A mutation in store data or theme files that affects cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChangeType {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    CollectionCreated,
    CollectionUpdated,
    CollectionDeleted,
    PageCreated,
    PageUpdated,
    PageDeleted,
    NavigationUpdated,
    TemplateUpdated,
    StoreSettingsUpdated,
    DomainUpdated,
    TemplateStoreUpdated,
}

impl ChangeType {
    /// Every change type, in wire order.
    pub const ALL: [ChangeType; 14] = [
        ChangeType::ProductCreated,
        ChangeType::ProductUpdated,
        ChangeType::ProductDeleted,
        ChangeType::CollectionCreated,
        ChangeType::CollectionUpdated,
        ChangeType::CollectionDeleted,
        ChangeType::PageCreated,
        ChangeType::PageUpdated,
        ChangeType::PageDeleted,
        ChangeType::NavigationUpdated,
        ChangeType::TemplateUpdated,
        ChangeType::StoreSettingsUpdated,
        ChangeType::DomainUpdated,
        ChangeType::TemplateStoreUpdated,
    ];

    /// Wire representation (snake_case, as emitted by the admin backend).
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::ProductCreated => "product_created",
            ChangeType::ProductUpdated => "product_updated",
            ChangeType::ProductDeleted => "product_deleted",
            ChangeType::CollectionCreated => "collection_created",
            ChangeType::CollectionUpdated => "collection_updated",
            ChangeType::CollectionDeleted => "collection_deleted",
            ChangeType::PageCreated => "page_created",
            ChangeType::PageUpdated => "page_updated",
            ChangeType::PageDeleted => "page_deleted",
            ChangeType::NavigationUpdated => "navigation_updated",
            ChangeType::TemplateUpdated => "template_updated",
            ChangeType::StoreSettingsUpdated => "store_settings_updated",
            ChangeType::DomainUpdated => "domain_updated",
            ChangeType::TemplateStoreUpdated => "template_store_updated",
        }
    }
}

impl FromStr for ChangeType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ChangeType::ALL
            .iter()
            .find(|change| change.as_str() == value)
            .copied()
            .ok_or_else(|| DomainError::unknown_change_type(value))
    }
}

impl TryFrom<String> for ChangeType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChangeType> for String {
    fn from(change: ChangeType) -> Self {
        change.as_str().to_string()
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
