//! Development stand-ins for the auth collaborators. Not for production: the
//! hasher is reversible-by-inspection and tokens live in process memory.

use crate::auth::{Mailer, PasswordHasher, TokenIssuer, TokenPurpose};
use crate::error::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Marks hashes with a prefix so misuse in tests is obvious.
pub struct DevHasher;

impl PasswordHasher for DevHasher {
    fn hash(&self, raw: &str) -> String {
        format!("dev${}", raw)
    }

    fn verify(&self, raw: &str, hashed: &str) -> bool {
        hashed == format!("dev${}", raw)
    }
}

/// Random opaque tokens kept in an in-process map.
#[derive(Default)]
pub struct DevTokenIssuer {
    tokens: RwLock<HashMap<String, (i64, TokenPurpose)>>,
}

impl DevTokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenIssuer for DevTokenIssuer {
    fn issue(&self, user_id: i64, purpose: TokenPurpose) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.tokens
            .write()
            .unwrap()
            .insert(token.clone(), (user_id, purpose));
        token
    }

    fn verify(&self, token: &str, purpose: TokenPurpose) -> Option<i64> {
        self.tokens
            .read()
            .unwrap()
            .get(token)
            .filter(|(_, p)| *p == purpose)
            .map(|(id, _)| *id)
    }
}

/// Logs instead of sending. The activation/reset links end up in the server
/// log where integration tests can read them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        tracing::info!(to, subject, body, "mail (dev)");
        Ok(())
    }
}
