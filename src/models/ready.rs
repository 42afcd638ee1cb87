use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API response for the readiness probe
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReadyResponse {
    pub status: String,
    pub n_live_docs: u32,
}
