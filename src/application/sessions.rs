//! Session tokens resolving a browser cookie to a user.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::UserRecord;

const TOKEN_PREFIX: &str = "ip";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("unknown user `{0}`")]
    UnknownUser(String),
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
}

impl SessionService {
    pub fn new(users: Arc<dyn UsersRepo>, sessions: Arc<dyn SessionsRepo>) -> Self {
        Self { users, sessions }
    }

    /// Issue a new token for `username`. Only the digest is persisted.
    pub async fn issue(&self, username: &str) -> Result<SessionIssued, SessionError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| SessionError::UnknownUser(username.to_string()))?;

        let secret = Self::generate_secret();
        let token = format!("{TOKEN_PREFIX}_{secret}");
        self.sessions
            .create_session(user.id, &Self::hash_secret(&secret))
            .await?;

        Ok(SessionIssued { user, token })
    }

    /// Resolve a cookie value. Malformed or unknown tokens yield `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, SessionError> {
        let Some(secret) = Self::parse_token(token) else {
            return Ok(None);
        };
        Ok(self
            .sessions
            .find_user_by_token_hash(&Self::hash_secret(secret))
            .await?)
    }

    pub(crate) fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize().as_slice())
    }

    fn generate_secret() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn parse_token(token: &str) -> Option<&str> {
        let (prefix, secret) = token.trim().split_once('_')?;
        if prefix != TOKEN_PREFIX || secret.len() < MIN_SECRET_LEN {
            return None;
        }
        Some(secret)
    }
}
