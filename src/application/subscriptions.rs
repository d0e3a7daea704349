//! Follow edges between a viewer and the authors they subscribe to.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::{FollowRecord, UserRecord};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("`{user}` already follows `{author}`")]
    AlreadyFollowing { user: String, author: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Removed,
    /// No edge existed; nothing changed.
    NotFollowing,
}

#[derive(Clone)]
pub struct SubscriptionService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl SubscriptionService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, SubscriptionError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| SubscriptionError::UnknownAuthor(username.to_string()))
    }

    /// Create the edge `viewer -> author`. Following oneself is allowed.
    ///
    /// The store owns uniqueness: a repeated follow surfaces as
    /// [`SubscriptionError::AlreadyFollowing`].
    pub async fn follow(
        &self,
        viewer: &UserRecord,
        author_username: &str,
    ) -> Result<FollowRecord, SubscriptionError> {
        let author = self.resolve_author(author_username).await?;
        match self.follows.create_follow(viewer.id, author.id).await {
            Ok(record) => {
                info!(
                    target = "inkpost::application::subscriptions",
                    user = %viewer.username,
                    author = %author.username,
                    "follow created"
                );
                Ok(record)
            }
            Err(RepoError::Duplicate { .. }) => Err(SubscriptionError::AlreadyFollowing {
                user: viewer.username.clone(),
                author: author.username,
            }),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn unfollow(
        &self,
        viewer: &UserRecord,
        author_username: &str,
    ) -> Result<UnfollowOutcome, SubscriptionError> {
        let author = self.resolve_author(author_username).await?;
        let removed = self.follows.delete_follow(viewer.id, author.id).await?;
        if removed == 0 {
            debug!(
                target = "inkpost::application::subscriptions",
                user = %viewer.username,
                author = %author.username,
                "unfollow without existing edge"
            );
            return Ok(UnfollowOutcome::NotFollowing);
        }
        info!(
            target = "inkpost::application::subscriptions",
            user = %viewer.username,
            author = %author.username,
            "follow removed"
        );
        Ok(UnfollowOutcome::Removed)
    }

    pub async fn is_following(
        &self,
        viewer: &UserRecord,
        author: &UserRecord,
    ) -> Result<bool, SubscriptionError> {
        Ok(self.follows.is_following(viewer.id, author.id).await?)
    }

    pub async fn following_count(&self, viewer: &UserRecord) -> Result<u64, SubscriptionError> {
        Ok(self.follows.count_following(viewer.id).await?)
    }
}
