//! Bearer token check for the resource routes.

use super::error::ApiError;
use super::AppState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Username of the caller, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

fn authenticate(state: &AppState, header: Option<&str>) -> Result<String, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Could not validate credentials".to_string());

    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;
    let username = state.tokens.validate(token).map_err(|_| unauthorized())?;

    // The subject must still be a registered user.
    if !state.store.user_exists(&username)? {
        return Err(unauthorized());
    }
    Ok(username)
}

pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(&state, header) {
        Ok(username) => {
            request.extensions_mut().insert(AuthenticatedUser(username));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
