//! Collaborator interfaces for the auth endpoints. Token issuance, password
//! hashing, and mail delivery are host concerns; the plugin only orchestrates
//! them. Dev implementations live in `auth::dev`.

pub mod dev;
pub mod handlers;

use crate::error::AppError;
use crate::permission::Principal;
use async_trait::async_trait;
use axum::http::HeaderMap;

/// What a token is good for. Tokens are never valid across purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    Session,
    Activation,
    PasswordReset,
}

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> String;
    fn verify(&self, raw: &str, hashed: &str) -> bool;
}

pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: i64, purpose: TokenPurpose) -> String;
    fn verify(&self, token: &str, purpose: TokenPurpose) -> Option<i64>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

/// Resolve the caller from a bearer token, if any. Invalid or missing tokens
/// yield the anonymous principal; the permission gate decides what that may
/// see.
pub fn principal_from_headers(tokens: &dyn TokenIssuer, headers: &HeaderMap) -> Principal {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| tokens.verify(token, TokenPurpose::Session))
        .map(Principal::user)
        .unwrap_or_else(Principal::anonymous)
}
