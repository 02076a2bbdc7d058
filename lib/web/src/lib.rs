use axum::extract::DefaultBodyLimit;
use axum::routing::any;
use axum::Router;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::info;

mod config;
mod error;
mod request;
mod routes;
mod state;

pub use config::{ServerConfig, MAX_SPARQL_BODY_SIZE, SERVER_NAME};
pub use error::ApiGraphServerError;
pub use state::AppState;

use crate::routes::{handle_compose, handle_service};

/// Builds the routes of the gateway.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/service", any(handle_service))
        .route("/compose", any(handle_compose))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_SPARQL_BODY_SIZE))
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from_str(&config.bind)?;

    let app = create_router(AppState {
        gateway: config.gateway,
    });
    let app = if config.cors {
        app.layer(tower_http::cors::CorsLayer::permissive())
    } else {
        app
    };

    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    Ok(axum::serve(listener, app).await?)
}
