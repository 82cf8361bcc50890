use super::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Bearer credential missing, malformed, expired or otherwise unverifiable.
    /// Raised before any resource lookup.
    #[error("Authentication required")]
    Unauthenticated,

    /// Valid identity, but the target resource belongs to somebody else.
    #[error("{0}")]
    Forbidden(String),

    /// Client error: unknown column, bad value, missing referenced id or a
    /// rolled-back commit. The message names the offending field or value.
    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }
}
