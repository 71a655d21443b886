//! Configuration for the Catalog API

use core_config::{
    AppInfo, ConfigError, FromEnv, app_info, env_parse, env_required, server::ServerConfig,
};
use database::common::RetryConfig;
use database::mongodb::MongoConfig;
use domain_catalog::{CatalogConfig, QueryConfig, query::DEFAULT_PAGE_SIZE};

pub use core_config::Environment;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    pub catalog: CatalogConfig,
    /// Comma-separated origins allowed by CORS
    pub cors_allowed_origin: String,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let app = app_info!();
        let mongodb = MongoConfig::from_env()?.with_app_name(app.name);

        Ok(Self {
            app,
            mongodb,
            server: ServerConfig::from_env()?,
            environment: Environment::from_env(),
            catalog: catalog_config_from_env()?,
            cors_allowed_origin: env_required("CORS_ALLOWED_ORIGIN")?,
        })
    }
}

/// Environment variables:
/// - `CATALOG_PAGE_SIZE` (default: 3, at least 1)
/// - `CATALOG_REVIEW_RETRIES` (default: 5)
/// - `CATALOG_REVIEW_RETRY_DELAY_MS` (default: 10)
fn catalog_config_from_env() -> Result<CatalogConfig, ConfigError> {
    let default_page_size = env_parse("CATALOG_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
    if default_page_size == 0 {
        return Err(ConfigError::ParseError {
            key: "CATALOG_PAGE_SIZE".to_string(),
            details: "must be at least 1".to_string(),
        });
    }

    let defaults = CatalogConfig::default().review_retry;
    let review_retry = RetryConfig {
        max_retries: env_parse("CATALOG_REVIEW_RETRIES", defaults.max_retries)?,
        initial_delay_ms: env_parse("CATALOG_REVIEW_RETRY_DELAY_MS", defaults.initial_delay_ms)?,
        ..defaults
    };

    Ok(CatalogConfig {
        query: QueryConfig { default_page_size },
        review_retry,
    })
}
