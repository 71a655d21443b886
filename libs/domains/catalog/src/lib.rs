//! Catalog Domain
//!
//! Product search and review aggregation for the storefront, backed by MongoDB.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Validation, paging, optimistic review retries
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌──────────────────────────────┐
//! │ Repository  │     │ query: criteria → predicate   │
//! └──────┬──────┘     │ reviews: one per reviewer,    │
//!        │            │          count + mean rating  │
//! ┌──────▼──────┐     └──────────────────────────────┘
//! │   Models    │
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_catalog::{handlers, mongodb::MongoProductRepository, service::CatalogService};
//! use mongodb::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//! let db = client.database("catalog");
//!
//! let repository = MongoProductRepository::new(&db);
//! repository.init_indexes().await?;
//! let service = CatalogService::new(repository);
//!
//! let router = handlers::router(service);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod query;
pub mod repository;
pub mod reviews;
pub mod service;

pub use error::{CatalogError, CatalogResult};
pub use handlers::{ApiDoc, gateway_identity};
pub use memory::InMemoryProductRepository;
pub use models::{
    CreateProduct, Product, ReviewInput, ReviewReceipt, Reviewer, SearchPage, UpdateProduct,
};
pub use mongodb::MongoProductRepository;
pub use query::{QueryBuilder, QueryConfig, ResolvedQuery, SearchCriteria, ValidationError};
pub use repository::ProductRepository;
pub use reviews::{RatingAggregate, Review};
pub use service::{CatalogConfig, CatalogService};
