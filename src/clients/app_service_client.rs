use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::clients::AccessPolicy;
use crate::models::{FileMeta, FileNode, SyncError};

/// HTTP client for the project service that owns projects, sharing and file metadata.
#[derive(Debug)]
pub struct AppServiceClient {
    client: Client,
    base_url: String,
    jwt_secret: String,
    service_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    type_: String,
    exp: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessResponse {
    has_access: bool,
}

impl AppServiceClient {
    pub fn new(
        base_url: String,
        jwt_secret: String,
        service_name: String,
        timeout: std::time::Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt_secret,
            service_name,
        })
    }

    fn generate_token(&self) -> Result<String, SyncError> {
        let expiration = Utc::now()
            .checked_add_signed(Duration::seconds(60)) // 1 minute expiration
            .ok_or_else(|| SyncError::Upstream("Token expiry out of range".to_string()))?
            .timestamp();

        let claims = Claims {
            sub: self.service_name.clone(),
            type_: "service".to_string(),
            exp: expiration as usize,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.jwt_secret.as_bytes()))
            .map_err(|e| SyncError::Upstream(format!("Failed to generate service token: {}", e)))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, SyncError> {
        let token = self.generate_token()?;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        self.client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                error!("Request to app service failed ({}): {}", url, e);
                SyncError::Upstream(e.to_string())
            })
    }

    /// Whether the user owns the project or had it shared with them.
    pub async fn get_project_access(&self, project_id: &str, user_id: &str) -> Result<bool, SyncError> {
        let res = self.get(&format!("/projects/{}/access/{}", project_id, user_id)).await?;
        match res.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(false),
            status if status.is_success() => {
                let body: AccessResponse = res.json().await.map_err(|e| SyncError::Upstream(e.to_string()))?;
                Ok(body.has_access)
            }
            status => Err(SyncError::Upstream(format!("Access check returned {}", status))),
        }
    }

    pub async fn get_file_meta(&self, file_id: &str) -> Result<Option<FileMeta>, SyncError> {
        let res = self.get(&format!("/files/{}", file_id)).await?;
        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => res
                .json()
                .await
                .map(Some)
                .map_err(|e| SyncError::Upstream(e.to_string())),
            status => Err(SyncError::Upstream(format!("File lookup returned {}", status))),
        }
    }

    pub async fn get_file_tree(&self, project_id: &str) -> Result<Vec<FileNode>, SyncError> {
        let res = self.get(&format!("/projects/{}/files", project_id)).await?;
        match res.status() {
            StatusCode::NOT_FOUND => Err(SyncError::NotFound(format!("Project '{}'", project_id))),
            status if status.is_success() => res.json().await.map_err(|e| SyncError::Upstream(e.to_string())),
            status => Err(SyncError::Upstream(format!("File tree lookup returned {}", status))),
        }
    }
}

#[async_trait]
impl AccessPolicy for AppServiceClient {
    async fn has_access(&self, user_id: &str, project_id: &str) -> Result<bool, SyncError> {
        self.get_project_access(project_id, user_id).await
    }
}
