//! Database connectors and retry utilities
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB connector and health checks
//! - `config` - `MongoConfig` loading through `core_config::FromEnv`
//!
//! # Example
//!
//! ```ignore
//! use database::common::RetryConfig;
//! use database::mongodb::{MongoConfig, connect_from_config_with_retry};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017", "catalog");
//! let client = connect_from_config_with_retry(&config, RetryConfig::default()).await?;
//! let db = client.database(config.database());
//! ```
//!
//! The retry helpers in [`common`] are independent of any driver and are
//! also used for optimistic-concurrency write loops.

pub mod common;

#[cfg(feature = "mongodb")]
pub mod mongodb;
