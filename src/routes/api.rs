use crate::{
    AppState,
    handlers::{diagnostics, health_check, ready_check, refresh_file_list},
    routes::auth_middleware::auth_middleware,
};
use axum::{routing::{get, post}, Router, middleware};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    let protected = Router::<Arc<AppState>>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/projects/:project_id/file-list", post(refresh_file_list))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)); // Applies to all routes added above

    Router::<Arc<AppState>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .merge(protected)
        .with_state(state)
}
