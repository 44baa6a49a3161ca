// Auth handlers: login, refresh, logout
use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::models::TokenPair;
use crate::proxy::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// POST /auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    body: Bytes,
) -> GatewayResult<Json<TokenPair>> {
    let request: LoginRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequestBody(e.to_string()))?;

    let identity = match state
        .token_service
        .authenticate(&request.email, &request.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("Login failed for {}", request.email);
            return Err(e);
        }
    };

    let pair = state.token_service.issue(&identity).await?;
    tracing::info!("User {} logged in", identity.email);
    Ok(Json(pair))
}

/// POST /auth/refresh
pub async fn handle_refresh(
    State(state): State<AppState>,
    body: Bytes,
) -> GatewayResult<Json<TokenPair>> {
    let request: RefreshRequest = serde_json::from_slice(&body).unwrap_or_default();
    let token = request
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or(GatewayError::InvalidRefreshToken)?;

    let pair = state.token_service.rotate(&token).await?;
    Ok(Json(pair))
}

/// POST /auth/logout. Always succeeds.
pub async fn handle_logout(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let request: RefreshRequest = serde_json::from_slice(&body).unwrap_or_default();
    if let Some(token) = request.refresh_token.filter(|t| !t.is_empty()) {
        state.token_service.revoke(&token).await;
    }
    Json(json!({ "ok": true }))
}
