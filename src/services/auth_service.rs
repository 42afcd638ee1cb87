use async_trait::async_trait;
use axum::http::{self, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use tracing::info;

use crate::clients::{Authenticator, UserIdentity};
use crate::models::SyncError;

/// Get the bearer token from a request's headers: Authorization header first, then the `auth_token` cookie.
pub fn get_auth_token(headers: &HeaderMap) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = headers.get(http::header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        for c in cookie::Cookie::split_parse(cookie_header).flatten() {
            if c.name() == "auth_token" {
                return Ok(c.value().to_string());
            }
        }
        Err("auth_token cookie not found".to_string())
    }
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

/// Verifies user access tokens signed with the shared HS256 secret.
pub struct JwtAuthenticator {
    secret: String,
}

impl JwtAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn verify(&self, token: &str) -> Result<UserIdentity, SyncError> {
        let token_data = validate_jwt(token, &self.secret)
            .map_err(|e| SyncError::Auth(format!("JWT validation failed: {}", e)))?;
        let claims = &token_data.claims;

        // Service tokens may call the REST hooks but never open a collaborative session
        if let Some(token_type) = claims.get("type").and_then(|v| v.as_str()) {
            if token_type != "user" {
                return Err(SyncError::Auth(format!("Token type '{}' cannot open a session", token_type)));
            }
        }

        let id = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SyncError::Auth("JWT token does not contain 'sub' claim".to_string()))?
            .to_string();
        let email = claims.get("email").and_then(|v| v.as_str()).map(str::to_string);

        info!("JWT token validated successfully for user: {}", id);
        Ok(UserIdentity { id, email })
    }
}
