use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API response for the liveness probe
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub message: String,
}
