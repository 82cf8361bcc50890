use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username already exists")]
    UsernameExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid password")]
    InvalidPassword,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::UsernameExists => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidPassword => StatusCode::UNAUTHORIZED,
        }
    }
}
