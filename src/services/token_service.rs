use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::configs::settings::Auth;
use crate::models::User;

/// Claim names the service fills in itself. Callers may not supply these as
/// extra claims.
const RESERVED_CLAIMS: &[&str] = &["sub", "iat", "exp"];

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("'{0}' is a reserved claim and cannot be set")]
    ReservedClaim(String),

    #[error(transparent)]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub user_id: i64,
    pub token: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    #[serde(flatten, default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

impl TokenClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Clone)]
pub struct TokenService {
    expiration: u64,
    secret: String,
}

impl TokenService {
    pub fn new(auth: Auth) -> Self {
        Self {
            expiration: auth.expiration,
            secret: auth.secret,
        }
    }

    /// Issues a signed token for the given user. `ttl_seconds` overrides the
    /// configured expiration; `extra_claims` are embedded alongside the
    /// reserved claims and rejected if they collide with one.
    pub fn issue(
        &self,
        user: &User,
        extra_claims: HashMap<String, Value>,
        ttl_seconds: Option<u64>,
    ) -> Result<Token, TokenError> {
        if let Some(reserved) = extra_claims.keys().find(|key| RESERVED_CLAIMS.contains(&key.as_str())) {
            return Err(TokenError::ReservedClaim(reserved.clone()));
        }

        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs();
        let exp = iat + ttl_seconds.unwrap_or(self.expiration);

        let claims = TokenClaims {
            sub: user.id.to_string(),
            iat,
            exp,
            extra: extra_claims,
        };

        let encoding_key = EncodingKey::from_secret(self.secret.as_ref());
        let token = encode(&Header::default(), &claims, &encoding_key)?;

        Ok(Token {
            user_id: user.id,
            token,
            iat,
            exp,
        })
    }

    /// Verifies a token and returns its claims. Fails closed: a bad
    /// signature, malformed structure or past expiration all yield `None`.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map(|data| data.claims)
        .ok()
    }
}
