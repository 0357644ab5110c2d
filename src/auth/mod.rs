//! Bearer token authentication.
//!
//! # Responsibilities
//! - Define the `Authenticator` seam the pipeline calls
//! - Verify HS256 JWTs signed with the shared secret (jwt.rs)
//!
//! # Design Decisions
//! - Verification is synchronous; it is pure CPU work on a short string
//! - The pipeline only sees a subject or a failure, never token internals

pub mod jwt;

use thiserror::Error;

pub use jwt::{issue_token, Claims, JwtAuthenticator};

/// Identity a token was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
}

/// Why a request could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Turns a presented bearer token into a validated subject.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Subject, AuthError>;
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
