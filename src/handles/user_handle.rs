use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::configs::Storage;
use crate::errors::{ApiError, AuthError};
use crate::middlewares::CurrentUser;
use crate::models::User;
use crate::services::{AuthService, TokenService};

#[derive(Serialize, Deserialize, Clone)]
pub struct CredentialsBody {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct UserState {
    pub auth_service: Arc<AuthService>,
    pub token_service: Arc<TokenService>,
    pub storage: Arc<Storage>,
}

pub async fn register(
    State(state): State<UserState>,
    Json(body): Json<CredentialsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(&body.username)
        .fetch_optional(state.storage.get_pool())
        .await?;

    if existing.is_some() {
        return Err(AuthError::UsernameExists.into());
    }

    let password_hash = state
        .auth_service
        .hash(&body.password)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;

    let mut tx = state.storage.get_pool().begin().await?;

    let user: User =
        sqlx::query_as("INSERT INTO users (username, password) VALUES (?, ?) RETURNING *")
            .bind(&body.username)
            .bind(&password_hash)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;

    let token = state
        .token_service
        .issue(&user, HashMap::new(), None)
        .map_err(|e| anyhow!("Failed to issue token: {}", e))?;

    Ok(Json(token))
}

pub async fn login(
    State(state): State<UserState>,
    Json(body): Json<CredentialsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(&body.username)
        .fetch_optional(state.storage.get_pool())
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let verified = state
        .auth_service
        .verify(&user.password, &body.password)
        .map_err(|e| anyhow!("Failed to verify password: {}", e))?;

    if !verified {
        return Err(AuthError::InvalidPassword.into());
    }

    let token = state
        .token_service
        .issue(&user, HashMap::new(), None)
        .map_err(|e| anyhow!("Failed to issue token: {}", e))?;

    Ok(Json(token))
}

/// Deletes the calling identity. Owned sensors and their readings go with it
/// through the store's cascades.
pub async fn delete_account(
    State(state): State<UserState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.storage.get_pool().begin().await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}
