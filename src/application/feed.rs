use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use thiserror::Error;

use crate::application::pagination::{Page, PageNumber, Paginator};
use crate::application::repos::{FeedScope, FollowsRepo, GroupsRepo, PostsRepo, RepoError, UsersRepo};
use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};

pub const METRIC_FEED_COMPOSE_MS: &str = "inkpost_feed_compose_ms";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

pub struct ProfileFeed {
    pub author: UserRecord,
    pub page: Page<PostRecord>,
    /// False for anonymous viewers.
    pub following: bool,
    pub is_self: bool,
}

/// Read side of the post store: resolves scopes and pages through them.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            paginator,
        }
    }

    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    /// Every post in `scope`, newest first.
    pub async fn compose(&self, scope: FeedScope) -> Result<Vec<PostRecord>, FeedError> {
        Ok(self.posts.list_all_posts(scope).await?)
    }

    /// One page of `scope`; only the requested slice is loaded.
    pub async fn page(
        &self,
        scope: FeedScope,
        number: PageNumber,
    ) -> Result<Page<PostRecord>, FeedError> {
        let started = Instant::now();
        let total = self.posts.count_posts(scope).await?;
        let window = self.paginator.window(total, number);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts.list_posts(scope, window).await?
        };
        histogram!(METRIC_FEED_COMPOSE_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(Page::from_window(items, window))
    }

    pub async fn resolve_group(&self, slug: &str) -> Result<GroupRecord, FeedError> {
        self.groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))
    }

    pub async fn resolve_author(&self, username: &str) -> Result<UserRecord, FeedError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))
    }

    pub async fn index_page(&self, number: PageNumber) -> Result<Page<PostRecord>, FeedError> {
        self.page(FeedScope::All, number).await
    }

    pub async fn group_page(&self, slug: &str, number: PageNumber) -> Result<GroupFeed, FeedError> {
        let group = self.resolve_group(slug).await?;
        let page = self.page(FeedScope::Group(group.id), number).await?;
        Ok(GroupFeed { group, page })
    }

    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        number: PageNumber,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self.resolve_author(username).await?;
        let page = self.page(FeedScope::Author(author.id), number).await?;
        let following = match viewer {
            Some(viewer) => self.follows.is_following(viewer.id, author.id).await?,
            None => false,
        };
        let is_self = viewer.is_some_and(|viewer| viewer.id == author.id);
        Ok(ProfileFeed {
            author,
            page,
            following,
            is_self,
        })
    }

    /// Posts by authors `viewer` follows. No follows means an empty page.
    pub async fn follow_page(
        &self,
        viewer: &UserRecord,
        number: PageNumber,
    ) -> Result<Page<PostRecord>, FeedError> {
        self.page(FeedScope::FollowedBy(viewer.id), number).await
    }
}
