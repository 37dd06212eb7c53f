//! autonomy-gateway server entry point.
//!
//! Runs the schema migration, wires the services and the workflow
//! engine, and starts the Axum HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use autonomy_gateway::api;
use autonomy_gateway::app_state::AppState;
use autonomy_gateway::config::GatewayConfig;
use autonomy_gateway::external::geocoder::NominatimGeocoder;
use autonomy_gateway::external::notifier::PushClient;
use autonomy_gateway::persistence::{migrate, PostgresStore, Store};
use autonomy_gateway::service::{
    MetricService, PoiService, ProfileService, RatingService, ReportService,
};
use autonomy_gateway::workflows::WorkflowEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting autonomy-gateway");

    // Storage: pool, then schema migration. A failed migration aborts
    // startup with a non-zero exit.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.storage_timeout_secs))
        .connect(&config.database_url)
        .await?;
    migrate::run(&pool).await?;
    let store: Arc<dyn Store> = Arc::new(PostgresStore::new(pool));

    // External collaborators
    let external_timeout = Duration::from_secs(config.external_timeout_secs);
    let geocoder = Arc::new(NominatimGeocoder::new(
        &config.geocoder_endpoint,
        external_timeout,
    )?);
    let notifier = Arc::new(PushClient::new(
        &config.notifier_endpoint,
        &config.notifier_app_key,
        external_timeout,
    )?);

    // Services and the workflow engine
    let metrics = MetricService::new(store.clone(), geocoder.clone());
    let workflows = Arc::new(WorkflowEngine::new(store.clone(), metrics.clone(), notifier));

    let app_state = AppState {
        store: store.clone(),
        profiles: ProfileService::new(store.clone(), metrics.clone()),
        pois: PoiService::new(store.clone(), geocoder.clone(), metrics.clone()),
        ratings: RatingService::new(store.clone()),
        reports: ReportService::new(store.clone(), metrics.clone()),
        metrics,
        workflows,
        geocoder,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
