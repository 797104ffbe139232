//! Edge (CDN) cache purging.
//!
//! Purges are best-effort: the local cache is the source of truth for
//! coherence, the edge just catches up a little faster. Failures are logged
//! and never propagate into the invalidation flow.

use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use time::OffsetDateTime;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::config::EdgeSettings;

use super::error::InfraError;

pub(crate) const METRIC_PURGE_MS: &str = "vetrina_edge_purge_ms";

/// Purges paths from an edge cache in front of the template origin.
#[async_trait]
pub trait EdgeCache: Send + Sync {
    async fn purge(&self, path: &str) -> Result<(), InfraError>;
}

/// `EdgeCache` backed by the CDN's invalidation API.
pub struct CdnPurger {
    client: Client,
    api_endpoint: Url,
    distribution_id: String,
}

impl CdnPurger {
    pub fn new(api_endpoint: Url, distribution_id: impl Into<String>) -> Result<Self, InfraError> {
        let client = Client::builder()
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        Ok(Self {
            client,
            api_endpoint,
            distribution_id: distribution_id.into(),
        })
    }

    /// Build a purger from settings. Returns `None` when no distribution is
    /// configured; callers then skip edge purging entirely.
    pub fn from_settings(settings: &EdgeSettings) -> Result<Option<Self>, InfraError> {
        match (&settings.api_endpoint, &settings.distribution_id) {
            (Some(endpoint), Some(distribution_id)) => {
                Ok(Some(Self::new(endpoint.clone(), distribution_id)?))
            }
            _ => Ok(None),
        }
    }

    /// Purge paths look like `/templates/{store}/...`; carrying the store
    /// segment in the reference keeps one store's invalidations easy to
    /// correlate in CDN logs.
    fn caller_reference(path: &str) -> String {
        let store = path
            .trim_start_matches('/')
            .split('/')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .unwrap_or("unknown");
        format!(
            "template-invalidation-{store}-{}-{}",
            OffsetDateTime::now_utc().unix_timestamp(),
            Uuid::new_v4()
        )
    }

    fn invalidation_url(&self) -> String {
        format!(
            "{}/distributions/{}/invalidations",
            self.api_endpoint.as_str().trim_end_matches('/'),
            self.distribution_id
        )
    }
}

#[async_trait]
impl EdgeCache for CdnPurger {
    async fn purge(&self, path: &str) -> Result<(), InfraError> {
        let caller_reference = Self::caller_reference(path);
        let body = serde_json::json!({
            "paths": [path],
            "caller_reference": caller_reference,
        });

        debug!(path, caller_reference, "Submitting edge purge");
        let started = Instant::now();
        let response = self
            .client
            .post(self.invalidation_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| InfraError::http(err.to_string()))?;
        histogram!(METRIC_PURGE_MS).record(started.elapsed().as_millis() as f64);

        if !response.status().is_success() {
            return Err(InfraError::http(format!(
                "edge purge for `{path}` returned {}",
                response.status()
            )));
        }

        info!(path, "Edge cache purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_settings_requires_endpoint_and_distribution() {
        let empty = EdgeSettings {
            api_endpoint: None,
            distribution_id: None,
        };
        assert!(CdnPurger::from_settings(&empty)
            .expect("settings are valid")
            .is_none());

        let endpoint_only = EdgeSettings {
            api_endpoint: Some("https://cdn-api.example.com".parse().expect("valid url")),
            distribution_id: None,
        };
        assert!(CdnPurger::from_settings(&endpoint_only)
            .expect("settings are valid")
            .is_none());
    }

    #[test]
    fn invalidation_url_tolerates_trailing_slash() {
        let purger = CdnPurger::new(
            "https://cdn-api.example.com/v1/".parse().expect("valid url"),
            "E12345",
        )
        .expect("client builds");
        assert_eq!(
            purger.invalidation_url(),
            "https://cdn-api.example.com/v1/distributions/E12345/invalidations"
        );
    }

    #[test]
    fn caller_reference_carries_the_store_segment() {
        let scoped = CdnPurger::caller_reference("/templates/s1/sections/hero.liquid");
        assert!(scoped.starts_with("template-invalidation-s1-"));

        let wildcard = CdnPurger::caller_reference("/templates/s1/*");
        assert!(wildcard.starts_with("template-invalidation-s1-"));

        let odd = CdnPurger::caller_reference("/");
        assert!(odd.starts_with("template-invalidation-unknown-"));
    }
}
