//! Catalog API - REST server for product search and reviews

use axum_helpers::server::{create_production_app, create_router, health_router};
use axum_helpers::{create_cors_layer, parse_allowed_origins};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::common::RetryConfig;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!(database = %config.mongodb.database(), "Connecting to MongoDB");
    let mongo_client = database::mongodb::connect_from_config_with_retry(
        &config.mongodb,
        RetryConfig::default(),
    )
    .await?;
    let db = mongo_client.database(config.mongodb.database());

    let state = AppState {
        config: config.clone(),
        mongo_client,
        db,
    };

    api::init_indexes(&state).await?;

    let cors = create_cors_layer(parse_allowed_origins(&config.cors_allowed_origin)?);
    info!(origins = %config.cors_allowed_origin, "CORS configured");

    let app = create_router::<openapi::ApiDoc>(api::routes(&state), cors)
        .merge(health_router(state.config.app))
        .merge(api::health::router(state.clone()));

    info!(
        port = state.config.server.port,
        page_size = state.config.catalog.query.default_page_size,
        "Starting Catalog API"
    );

    let client = state.mongo_client.clone();
    create_production_app(app, &state.config.server, Duration::from_secs(30), async move {
        info!("Shutting down: closing MongoDB connections");
        client.shutdown().await;
        info!("MongoDB connection closed");
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Catalog API shutdown complete");
    Ok(())
}
