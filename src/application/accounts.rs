//! Operator-side creation of users and groups.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CreateGroupParams, CreateUserParams, GroupsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{validate_group_title, validate_username};
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug, validate_slug};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid slug: {0}")]
    Slug(#[from] SlugError),
    #[error("`{0}` is already taken")]
    Taken(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for AccountError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(err) => Self::Slug(err),
            SlugAsyncError::Predicate(err) => Self::Repo(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>, groups: Arc<dyn GroupsRepo>) -> Self {
        Self { users, groups }
    }

    pub async fn create_user(
        &self,
        username: &str,
        display_name: Option<&str>,
    ) -> Result<UserRecord, AccountError> {
        let username = validate_username(username)?;
        let display_name = display_name.map(str::trim).unwrap_or_default().to_string();

        let user = self
            .users
            .create_user(CreateUserParams {
                username: username.clone(),
                display_name,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AccountError::Taken(username.clone()),
                other => AccountError::Repo(other),
            })?;

        info!(
            target = "inkpost::application::accounts",
            user_id = user.id,
            username = %user.username,
            "user created"
        );
        Ok(user)
    }

    /// Create a group. Without an explicit slug one is derived from the title.
    pub async fn create_group(&self, input: NewGroup) -> Result<GroupRecord, AccountError> {
        let title = validate_group_title(&input.title)?;
        let slug = match input.slug.as_deref() {
            Some(raw) => validate_slug(raw)?,
            None => {
                let groups = self.groups.clone();
                generate_unique_slug(&title, move |candidate| {
                    let groups = groups.clone();
                    let candidate = candidate.to_string();
                    async move {
                        let existing = groups.find_by_slug(&candidate).await?;
                        Ok::<bool, RepoError>(existing.is_none())
                    }
                })
                .await?
            }
        };

        let group = self
            .groups
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: input.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AccountError::Taken(slug.clone()),
                other => AccountError::Repo(other),
            })?;

        info!(
            target = "inkpost::application::accounts",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }
}
