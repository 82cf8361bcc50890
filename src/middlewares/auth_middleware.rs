use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, Header};

use crate::configs::Storage;
use crate::errors::ApiError;
use crate::models::User;
use crate::services::TokenService;

#[derive(Clone)]
pub struct TokenState {
    pub token_service: Arc<TokenService>,
    pub storage: Arc<Storage>,
}

/// The identity resolved from the bearer credential, attached as a request
/// extension for downstream handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Verifies the bearer credential and resolves it to a user before any
/// resource is looked up. Every failure collapses to 401 so nothing about
/// stored resources leaks to unauthenticated callers.
pub async fn auth(
    State(state): State<TokenState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let mut headers = req.headers_mut().get_all(header::AUTHORIZATION).iter();

    let header: Authorization<Bearer> =
        Authorization::decode(&mut headers).map_err(|_| ApiError::Unauthenticated)?;

    let claims = state
        .token_service
        .verify(header.token())
        .ok_or(ApiError::Unauthenticated)?;

    let user_id = claims.user_id().ok_or(ApiError::Unauthenticated)?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(state.storage.get_pool())
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
