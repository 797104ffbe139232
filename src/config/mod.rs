//! Configuration layer: typed settings with layered precedence (file → env).

use std::path::Path;
use std::str::FromStr;

use config::{Config, Environment as EnvSource, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vetrina";
const ENV_PREFIX: &str = "VETRINA";

/// Deployment environment. Drives origin selection and cache semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!(
                "unknown environment `{other}` (expected `production` or `development`)"
            )),
        }
    }
}

/// Fully-resolved engine settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub origin: OriginSettings,
    pub edge: EdgeSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

/// Where template objects are read from.
///
/// Production reads through the CDN; development reads the object store
/// directly so template edits show up without waiting on edge TTLs.
#[derive(Debug, Clone)]
pub enum OriginSettings {
    Cdn { base_url: Url },
    ObjectStore { endpoint: Url, bucket: String },
}

/// Edge purge configuration. Both fields are required for purging to be
/// enabled; with either missing, invalidation is local-cache only.
#[derive(Debug, Clone)]
pub struct EdgeSettings {
    pub api_endpoint: Option<Url>,
    pub distribution_id: Option<String>,
}

/// Cache TTLs in milliseconds, one field per tier override.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub data_ttl_ms: u64,
    pub search_ttl_ms: u64,
    pub cart_data_ttl_ms: u64,
    pub navigation_ttl_ms: u64,
    pub template_ttl_ms: u64,
    pub page_ttl_ms: u64,
    pub index_page_ttl_ms: u64,
    pub product_page_ttl_ms: u64,
    pub collection_page_ttl_ms: u64,
    pub policies_page_ttl_ms: u64,
    pub not_found_page_ttl_ms: u64,
    pub domain_ttl_ms: u64,
    pub dev_ttl_ms: u64,
    pub development: bool,
    pub dev_cache_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment).
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(EnvSource::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    environment: Option<String>,
    origin: RawOriginSettings,
    edge: RawEdgeSettings,
    cache: RawCacheSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    cdn_base_url: Option<Url>,
    object_store_endpoint: Option<Url>,
    bucket: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEdgeSettings {
    api_endpoint: Option<Url>,
    distribution_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    data_ttl_ms: Option<u64>,
    search_ttl_ms: Option<u64>,
    cart_data_ttl_ms: Option<u64>,
    navigation_ttl_ms: Option<u64>,
    template_ttl_ms: Option<u64>,
    page_ttl_ms: Option<u64>,
    index_page_ttl_ms: Option<u64>,
    product_page_ttl_ms: Option<u64>,
    collection_page_ttl_ms: Option<u64>,
    policies_page_ttl_ms: Option<u64>,
    not_found_page_ttl_ms: Option<u64>,
    domain_ttl_ms: Option<u64>,
    dev_ttl_ms: Option<u64>,
    dev_cache_enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            environment,
            origin,
            edge,
            cache,
            logging,
        } = raw;

        let environment = build_environment(environment)?;
        let origin = build_origin_settings(origin, environment)?;
        let edge = build_edge_settings(edge);
        let cache = build_cache_settings(cache, environment);
        let logging = build_logging_settings(logging)?;

        Ok(Self {
            environment,
            origin,
            edge,
            cache,
            logging,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}

fn build_environment(environment: Option<String>) -> Result<Environment, LoadError> {
    match environment {
        Some(value) => value
            .parse()
            .map_err(|reason| LoadError::invalid("environment", reason)),
        None => Ok(Environment::Production),
    }
}

fn build_origin_settings(
    origin: RawOriginSettings,
    environment: Environment,
) -> Result<OriginSettings, LoadError> {
    match environment {
        Environment::Production => {
            let base_url = origin
                .cdn_base_url
                .ok_or_else(|| LoadError::invalid("origin.cdn_base_url", "required in production"))?;
            Ok(OriginSettings::Cdn { base_url })
        }
        Environment::Development => {
            let endpoint = origin.object_store_endpoint.ok_or_else(|| {
                LoadError::invalid("origin.object_store_endpoint", "required in development")
            })?;
            let bucket = origin
                .bucket
                .ok_or_else(|| LoadError::invalid("origin.bucket", "required in development"))?;
            if bucket.trim().is_empty() {
                return Err(LoadError::invalid("origin.bucket", "must not be empty"));
            }
            Ok(OriginSettings::ObjectStore { endpoint, bucket })
        }
    }
}

fn build_edge_settings(edge: RawEdgeSettings) -> EdgeSettings {
    EdgeSettings {
        api_endpoint: edge.api_endpoint,
        distribution_id: edge
            .distribution_id
            .and_then(|value| (!value.trim().is_empty()).then_some(value)),
    }
}

fn build_cache_settings(cache: RawCacheSettings, environment: Environment) -> CacheSettings {
    let defaults = CacheConfig::default();
    CacheSettings {
        data_ttl_ms: cache.data_ttl_ms.unwrap_or(defaults.data_ttl_ms),
        search_ttl_ms: cache.search_ttl_ms.unwrap_or(defaults.search_ttl_ms),
        cart_data_ttl_ms: cache.cart_data_ttl_ms.unwrap_or(defaults.cart_data_ttl_ms),
        navigation_ttl_ms: cache.navigation_ttl_ms.unwrap_or(defaults.navigation_ttl_ms),
        template_ttl_ms: cache.template_ttl_ms.unwrap_or(defaults.template_ttl_ms),
        page_ttl_ms: cache.page_ttl_ms.unwrap_or(defaults.page_ttl_ms),
        index_page_ttl_ms: cache.index_page_ttl_ms.unwrap_or(defaults.index_page_ttl_ms),
        product_page_ttl_ms: cache
            .product_page_ttl_ms
            .unwrap_or(defaults.product_page_ttl_ms),
        collection_page_ttl_ms: cache
            .collection_page_ttl_ms
            .unwrap_or(defaults.collection_page_ttl_ms),
        policies_page_ttl_ms: cache
            .policies_page_ttl_ms
            .unwrap_or(defaults.policies_page_ttl_ms),
        not_found_page_ttl_ms: cache
            .not_found_page_ttl_ms
            .unwrap_or(defaults.not_found_page_ttl_ms),
        domain_ttl_ms: cache.domain_ttl_ms.unwrap_or(defaults.domain_ttl_ms),
        dev_ttl_ms: cache.dev_ttl_ms.unwrap_or(defaults.dev_ttl_ms),
        development: matches!(environment, Environment::Development),
        dev_cache_enabled: cache.dev_cache_enabled.unwrap_or(true),
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}
