pub mod aggregate;
pub mod auth_service;
pub mod filter;
pub mod time_window;
pub mod token_service;

pub use auth_service::AuthService;
pub use token_service::{Token, TokenClaims, TokenError, TokenService};
