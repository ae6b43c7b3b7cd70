use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::auth::{hash_password, verify_password};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> ApiResult<Json<TokenResponse>> {
    let username = creds.username.trim();
    if username.is_empty() || creds.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let hash = hash_password(&creds.password)?;
    if !state.store.create_user(username, &hash)? {
        return Err(ApiError::BadRequest("Username already registered".to_string()));
    }
    info!("Registered API user {}", username);

    Ok(Json(TokenResponse::bearer(state.tokens.issue(username)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> ApiResult<Json<TokenResponse>> {
    let username = creds.username.trim();
    let valid = match state.store.user_password_hash(username)? {
        Some(hash) => verify_password(&creds.password, &hash),
        None => false,
    };
    if !valid {
        return Err(ApiError::Unauthorized(
            "Incorrect username or password".to_string(),
        ));
    }

    Ok(Json(TokenResponse::bearer(state.tokens.issue(username)?)))
}
