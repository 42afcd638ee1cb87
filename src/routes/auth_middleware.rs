use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{error, info};
use crate::AppState;
use crate::services::auth_service::{validate_jwt, get_auth_token};

/// Turns the bearer token into principals for the REST handlers:
/// `u/<uid>` plus `r/<role>` for users, `s/<service>` for services.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {

    // 1. Get the auth token from the request
    let token = match get_auth_token(req.headers()) {
        Ok(token) => token,
        Err(_) => return Err(StatusCode::UNAUTHORIZED),
    };

    // 2. Validate Token
    let secret = match &state.config.cloud_auth_jwt_secret {
        Some(secret) => secret,
        None => {
            error!("Cloud auth JWT secret not configured");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let token_data = match validate_jwt(&token, secret) {
        Ok(token_data) => token_data,
        Err(e) => {
            error!("JWT validation failed: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 3. Both token types carry the principal in `sub`
    let token_type = token_data.claims.get("type").and_then(|v| v.as_str()).ok_or_else(|| {
        error!("JWT token does not contain 'type' claim");
        StatusCode::UNAUTHORIZED
    })?;
    let sub = token_data.claims.get("sub").and_then(|v| v.as_str()).map(str::to_string).ok_or_else(|| {
        error!("JWT token does not contain 'sub' claim");
        StatusCode::UNAUTHORIZED
    })?;

    match token_type {
        "user" => {
            info!("User token validated successfully");
            let mut prpls = vec![format!("u/{}", sub)];
            if let Some(roles) = token_data.claims.get("roles").and_then(|v| v.as_array()) {
                for role in roles.iter().filter_map(|r| r.as_str()) {
                    let role_prpl = format!("r/{}", role);
                    if !prpls.contains(&role_prpl) {
                        prpls.push(role_prpl);
                    }
                }
            }
            let extensions = req.extensions_mut();
            extensions.insert(prpls);
            extensions.insert(sub);
        }
        "service" => {
            info!("Service token validated successfully");
            req.extensions_mut().insert(vec![format!("s/{}", sub)]);
        }
        other => {
            error!("Invalid token type: {}", other);
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    Ok(next.run(req).await)
}
