use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Collaboration and host diagnostics (cloud admin only)
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Diagnostics snapshot", body = DiagnosticsResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Cloud Admin access required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Push a project's current file tree to connected sessions (app service only)
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/file-list",
    params(
        ("project_id" = String, Path, description = "Project whose file tree changed")
    ),
    responses(
        (status = 200, description = "File list pushed", body = FileListRefreshResponse),
        (status = 403, description = "Caller is not the app service", body = ErrorResponse),
        (status = 502, description = "App service unavailable", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[allow(dead_code)]
pub async fn refresh_file_list_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        refresh_file_list_doc,
    ),
    components(
        schemas(HealthResponse, ReadyResponse, DiagnosticsResponse, FileListRefreshResponse, FileNode, ErrorResponse)
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
