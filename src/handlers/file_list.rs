use crate::{AppState, auth::auth, models::{ErrorResponse, FileListRefreshResponse}};
use axum::{extract::{Path, State, Extension}, http::StatusCode, Json};
use std::sync::Arc;
use tracing::info;

/// Principal allowed to announce file tree changes.
pub const APP_SERVICE_NAME: &str = "colabri-app";

/// Re-read a project's file tree and push it to its file-list room
pub async fn refresh_file_list(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Extension(prpls): Extension<Vec<String>>,
) -> Result<(StatusCode, Json<FileListRefreshResponse>), (StatusCode, Json<ErrorResponse>)> {

    let caller = auth::ensure_service(&prpls, APP_SERVICE_NAME)?;
    info!("File list refresh for project {} requested by {}", project_id, caller);

    let n_sessions = state.gateway.publish_file_list(&project_id).await? as u32;

    Ok((
        StatusCode::OK,
        Json(FileListRefreshResponse { project_id, n_sessions }),
    ))
}
