//! Template origins.
//!
//! Where template bytes actually come from: the CDN in front of the theme
//! bucket (production) or the object store itself (development). Both speak
//! plain HTTP here; the loader does not care which one it holds.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::infra::error::InfraError;

const API_USER_AGENT: &str = "Vetrina-API/1.0";
const API_SOURCE_HEADER: &str = "x-api-source";
const API_SOURCE: &str = "vetrina-server";

#[derive(Debug, Clone, Error)]
pub enum OriginError {
    #[error("origin has no object under `{key}`")]
    NotFound { key: String },
    #[error("origin fetch for `{key}` failed: {message}")]
    Transport { key: String, message: String },
}

impl OriginError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn transport(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Reads template objects by storage key.
#[async_trait]
pub trait TemplateOrigin: Send + Sync {
    async fn fetch_text(&self, key: &str) -> Result<String, OriginError>;
    async fn fetch_bytes(&self, key: &str) -> Result<Bytes, OriginError>;
    /// Short name for logs (`cdn`, `object-store`).
    fn describe(&self) -> &'static str;
}

fn api_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
    headers.insert(API_SOURCE_HEADER, HeaderValue::from_static(API_SOURCE));
    headers
}

async fn fetch(client: &Client, base: &Url, key: &str) -> Result<reqwest::Response, OriginError> {
    let url = format!("{}/{key}", base.as_str().trim_end_matches('/'));
    debug!(url, key, "Fetching from origin");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| OriginError::transport(key, err.to_string()))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(OriginError::not_found(key));
    }
    if !response.status().is_success() {
        return Err(OriginError::transport(
            key,
            format!("origin returned {}", response.status()),
        ));
    }
    Ok(response)
}

/// Production origin: the CDN distribution in front of the theme bucket.
pub struct CdnOrigin {
    client: Client,
    base_url: Url,
}

impl CdnOrigin {
    pub fn new(base_url: Url) -> Result<Self, InfraError> {
        let client = Client::builder()
            .default_headers(api_headers())
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl TemplateOrigin for CdnOrigin {
    async fn fetch_text(&self, key: &str) -> Result<String, OriginError> {
        let response = fetch(&self.client, &self.base_url, key).await?;
        response
            .text()
            .await
            .map_err(|err| OriginError::transport(key, err.to_string()))
    }

    async fn fetch_bytes(&self, key: &str) -> Result<Bytes, OriginError> {
        let response = fetch(&self.client, &self.base_url, key).await?;
        response
            .bytes()
            .await
            .map_err(|err| OriginError::transport(key, err.to_string()))
    }

    fn describe(&self) -> &'static str {
        "cdn"
    }
}

/// Development origin: the object store over its HTTP endpoint, no CDN.
pub struct ObjectStoreOrigin {
    client: Client,
    bucket_url: Url,
}

impl ObjectStoreOrigin {
    pub fn new(endpoint: Url, bucket: &str) -> Result<Self, InfraError> {
        let bucket_url = endpoint
            .join(&format!("{bucket}/"))
            .map_err(|err| InfraError::configuration(err.to_string()))?;
        let client = Client::builder()
            .default_headers(api_headers())
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        Ok(Self { client, bucket_url })
    }
}

#[async_trait]
impl TemplateOrigin for ObjectStoreOrigin {
    async fn fetch_text(&self, key: &str) -> Result<String, OriginError> {
        let response = fetch(&self.client, &self.bucket_url, key).await?;
        response
            .text()
            .await
            .map_err(|err| OriginError::transport(key, err.to_string()))
    }

    async fn fetch_bytes(&self, key: &str) -> Result<Bytes, OriginError> {
        let response = fetch(&self.client, &self.bucket_url, key).await?;
        response
            .bytes()
            .await
            .map_err(|err| OriginError::transport(key, err.to_string()))
    }

    fn describe(&self) -> &'static str {
        "object-store"
    }
}
