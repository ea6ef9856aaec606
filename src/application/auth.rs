//! Bearer token authentication for post authors.
//!
//! Tokens are issued once by `create-user` and only their SHA-256 digest is
//! stored, so a lost token can only be replaced, never recovered.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::application::clock::Clock;
use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

const TOKEN_PREFIX: &str = "qk";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication token is malformed")]
    Malformed,
    #[error("authentication token is not recognised")]
    Invalid,
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct IssuedUser {
    pub user: UserRecord,
    /// Plain token; shown once and never stored.
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { users, clock }
    }

    pub async fn create_user(&self, name: &str, email: &str) -> Result<IssuedUser, AuthError> {
        let name = name.trim();
        let email = email.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(AuthError::Validation("name"));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("email"));
        }

        let token = format!("{TOKEN_PREFIX}_{}", generate_secret());
        let user = self
            .users
            .create_user(CreateUserParams {
                name: name.to_string(),
                email,
                token_hash: hash_token(&token),
                now: self.clock.now(),
            })
            .await?;

        Ok(IssuedUser { user, token })
    }

    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, AuthError> {
        let token = token.trim();
        let secret = token
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or(AuthError::Malformed)?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Malformed);
        }

        self.users
            .find_by_token_hash(&hash_token(token))
            .await?
            .ok_or(AuthError::Invalid)
    }
}

/// Hex-encoded SHA-256 digest stored in place of the token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
