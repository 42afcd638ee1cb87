//! Real-time collaboration core for LaTeX projects.
//!
//! Clients connect over a WebSocket, join a project's file-list room or a
//! file's room, and exchange CRDT updates. The server keeps one live document
//! per open file, fans updates out to co-editors, writes text back to storage
//! on a debounce and drops idle documents from memory.

pub mod auth;
pub mod clients;
pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use axum::{http::HeaderValue, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::docs::ApiDoc;
use crate::routes::create_api_routes;
use crate::ws::gateway::Gateway;
use crate::ws::handler::websocket_handler;

/// Shared state of the HTTP and WebSocket handlers.
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<Gateway>,
}

/// Assemble the full router: WebSocket endpoint, REST API and Swagger UI.
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_routes = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state.clone());

    let router = Router::new()
        .merge(ws_routes)
        .nest("/api", create_api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let origins = state
        .config
        .cors_origin_list()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();
    if origins.is_empty() {
        return router;
    }
    router.layer(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
