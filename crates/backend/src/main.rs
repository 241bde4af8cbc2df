use anyhow::Context;
use axum::http::{header, HeaderName, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

mod ai;
mod auth;
mod config;
mod db;
pub mod error;
mod handlers;
mod models;
pub mod repository;
mod routes;
mod schema;
mod services;
#[cfg(test)]
mod testing;

use auth::AuthConfig;
use config::AppConfig;
use repository::{PgStore, Store};
use services::{AnalysisService, ConcurrentBatchProcessor, EmailProcessor};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub analysis: Arc<AnalysisService>,
    pub auth_config: Arc<AuthConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let auth_config = AuthConfig::from_env().map_err(anyhow::Error::msg)?;

    // Establish database connection pool
    let pool = db::establish_connection_pool(&config.database_url, config.database_pool_size)
        .context("failed to build database pool")?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let model = Arc::new(ai::ChatCompletionsModel::new(config.ai.clone())?);
    let processor = Arc::new(EmailProcessor::new(store.clone(), model));
    let batch = Arc::new(ConcurrentBatchProcessor::new(
        processor.clone(),
        config.ai.cost_per_million_tokens,
    ));
    let analysis = Arc::new(AnalysisService::new(
        store.clone(),
        processor,
        batch,
        config.analysis.clone(),
    ));

    let state = AppState {
        store,
        analysis,
        auth_config: Arc::new(auth_config),
    };

    let app = routes::build_router(state).layer(build_cors_layer(
        config.cors_allowed_origins.as_deref(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build CORS layer from the configured origins.
///
/// Without configured origins, CORS is permissive (for development only).
fn build_cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .unwrap_or_default()
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!(
            "CORS_ALLOWED_ORIGINS not set or empty, using permissive CORS (not recommended for production)"
        );
        return CorsLayer::permissive();
    }

    tracing::info!("CORS configured for origins: {:?}", origins);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(handlers::FORCE_REANALYZE_HEADER),
        ])
        .allow_credentials(true)
}
