//! Catalog API routes

use axum::{Router, middleware};
use domain_catalog::{CatalogService, MongoProductRepository, gateway_identity, handlers};

use crate::state::AppState;

/// Catalog router backed by MongoDB, with reviewer identity taken from the gateway header
pub fn router(state: &AppState) -> Router {
    let repository = MongoProductRepository::new(&state.db);
    let service = CatalogService::with_config(repository, state.config.catalog.clone());
    handlers::router(service).layer(middleware::from_fn(gateway_identity))
}

/// Initialize product indexes
pub async fn init_indexes(state: &AppState) -> eyre::Result<()> {
    let repository = MongoProductRepository::new(&state.db);
    repository.init_indexes().await?;
    Ok(())
}
