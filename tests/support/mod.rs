//! Shared fixtures for router-level tests: an in-memory store behind every
//! repository trait and helpers for driving the router with `oneshot`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sqlx::Error as SqlxError;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

use inkpost::{
    application::{
        feed::FeedService,
        pagination::{PageWindow, Paginator},
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateUserParams, FeedScope, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo,
            RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
        sessions::SessionService,
        subscriptions::SubscriptionService,
    },
    cache::{CacheConfig, PageCache},
    config::AuthSettings,
    domain::entities::{
        AuthorRef, CommentRecord, FollowRecord, GroupRecord, GroupRef, PostRecord, UserRecord,
    },
    infra::{
        http::{self, HealthProbe, HttpState},
        uploads::UploadStorage,
    },
};

pub const SESSION_COOKIE: &str = "inkpost_session";
pub const BOUNDARY: &str = "inkpost-test-boundary";

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredFollow {
    id: i64,
    user_id: i64,
    author_id: i64,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<CommentRecord>,
    follows: Vec<StoredFollow>,
    sessions: HashMap<String, i64>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so feed order follows insertion order.
    fn timestamp(id: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(id)
    }

    fn user(&self, id: i64) -> Option<&UserRecord> {
        self.users.iter().find(|user| user.id == id)
    }

    fn author_ref(&self, id: i64) -> Result<AuthorRef, RepoError> {
        self.user(id)
            .map(UserRecord::as_author)
            .ok_or_else(|| RepoError::InvalidInput {
                message: format!("unknown user {id}"),
            })
    }

    fn post_record(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id))
            .map(GroupRef::from);
        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            created_at: post.created_at,
            author: self.author_ref(post.author_id)?,
            group,
            image: post.image.clone(),
        })
    }

    fn in_scope(&self, post: &StoredPost, scope: FeedScope) -> bool {
        match scope {
            FeedScope::All => true,
            FeedScope::Group(id) => post.group_id == Some(id),
            FeedScope::Author(id) => post.author_id == id,
            FeedScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == post.author_id),
        }
    }

    fn scoped(&self, scope: FeedScope) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| self.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts.into_iter().map(|post| self.post_record(post)).collect()
    }

    fn check_group(&self, group_id: Option<i64>) -> Result<(), RepoError> {
        match group_id {
            Some(id) if !self.groups.iter().any(|group| group.id == id) => {
                Err(RepoError::InvalidInput {
                    message: format!("unknown group {id}"),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Every repository trait over one set of in-memory tables.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    healthy: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::default(),
            healthy: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }

    pub fn insert_user(&self, username: &str) -> UserRecord {
        let mut tables = self.lock();
        let id = tables.next_id();
        let user = UserRecord {
            id,
            username: username.to_string(),
            display_name: String::new(),
            joined_at: Tables::timestamp(id),
        };
        tables.users.push(user.clone());
        user
    }

    pub fn insert_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.lock();
        let id = tables.next_id();
        let group = GroupRecord {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            description: String::new(),
            created_at: Tables::timestamp(id),
        };
        tables.groups.push(group.clone());
        group
    }

    pub fn insert_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> i64 {
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.posts.push(StoredPost {
            id,
            text: text.to_string(),
            created_at: Tables::timestamp(id),
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        });
        id
    }

    /// Insert a post sharing `other`'s creation time, so only the id orders them.
    pub fn insert_post_tied_with(&self, other: i64, author: &UserRecord, text: &str) -> i64 {
        let mut tables = self.lock();
        let created_at = tables
            .posts
            .iter()
            .find(|post| post.id == other)
            .map(|post| post.created_at)
            .expect("tied post exists");
        let id = tables.next_id();
        tables.posts.push(StoredPost {
            id,
            text: text.to_string(),
            created_at,
            author_id: author.id,
            group_id: None,
            image: None,
        });
        id
    }

    pub fn post(&self, id: i64) -> Option<PostRecord> {
        let tables = self.lock();
        tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.post_record(post).expect("post author exists"))
    }

    pub fn post_ids(&self) -> Vec<i64> {
        self.lock().posts.iter().map(|post| post.id).collect()
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn comment_count(&self, post_id: i64) -> usize {
        self.lock()
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .count()
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy
            .store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        scope: FeedScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let posts = self.lock().scoped(scope)?;
        Ok(posts
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect())
    }

    async fn list_all_posts(&self, scope: FeedScope) -> Result<Vec<PostRecord>, RepoError> {
        self.lock().scoped(scope)
    }

    async fn count_posts(&self, scope: FeedScope) -> Result<u64, RepoError> {
        let tables = self.lock();
        Ok(tables
            .posts
            .iter()
            .filter(|post| tables.in_scope(post, scope))
            .count() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let tables = self.lock();
        tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.post_record(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        tables.author_ref(params.author_id)?;
        tables.check_group(params.group_id)?;
        let id = tables.next_id();
        let post = StoredPost {
            id,
            text: params.text,
            created_at: Tables::timestamp(id),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        tables.posts.push(post.clone());
        tables.post_record(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        tables.check_group(params.group_id)?;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let post = post.clone();
        tables.post_record(&post)
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.id == id)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.lock();
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let id = tables.next_id();
        let group = GroupRecord {
            id,
            title: params.title,
            slug: params.slug,
            description: params.description,
            created_at: Tables::timestamp(id),
        };
        tables.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().user(id).cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.lock();
        if tables
            .users
            .iter()
            .any(|user| user.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let id = tables.next_id();
        let user = UserRecord {
            id,
            username: params.username,
            display_name: params.display_name,
            joined_at: Tables::timestamp(id),
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .lock()
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.lock();
        if !tables.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("unknown post {}", params.post_id),
            });
        }
        let author = tables.author_ref(params.author_id)?;
        let id = tables.next_id();
        let comment = CommentRecord {
            id,
            post_id: params.post_id,
            author,
            text: params.text,
            created_at: Tables::timestamp(id),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn create_follow(
        &self,
        user_id: i64,
        author_id: i64,
    ) -> Result<FollowRecord, RepoError> {
        let mut tables = self.lock();
        if tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
        {
            return Err(RepoError::Duplicate {
                constraint: "follows_unique_pair".to_string(),
            });
        }
        let user = tables.author_ref(user_id)?;
        let author = tables.author_ref(author_id)?;
        let id = tables.next_id();
        let created_at = Tables::timestamp(id);
        tables.follows.push(StoredFollow {
            id,
            user_id,
            author_id,
            created_at,
        });
        Ok(FollowRecord {
            id,
            user,
            author,
            created_at,
        })
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<u64, RepoError> {
        let mut tables = self.lock();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok((before - tables.follows.len()) as u64)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|edge| edge.user_id == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn find_user_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.lock();
        Ok(tables
            .sessions
            .get(token_hash)
            .and_then(|user_id| tables.user(*user_id))
            .cloned())
    }

    async fn create_session(&self, user_id: i64, token_hash: &str) -> Result<(), RepoError> {
        self.lock()
            .sessions
            .insert(token_hash.to_string(), user_id);
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<(), SqlxError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SqlxError::PoolTimedOut)
        }
    }
}

/// Responses collected into parts that are easy to assert on.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Text of every post card, in page order.
    pub fn post_texts(&self) -> Vec<String> {
        const MARKER: &str = "<p class=\"post-text\" style=\"white-space: pre-line\">";
        self.body
            .split(MARKER)
            .skip(1)
            .filter_map(|chunk| chunk.split("</p>").next())
            .map(str::to_string)
            .collect()
    }
}

/// The full router over a [`MemoryStore`], with uploads in a temp dir.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: HttpState,
    router: Router,
    _uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(cache: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let uploads = tempfile::tempdir().expect("temp uploads dir");
        let storage =
            Arc::new(UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"));

        let feed = Arc::new(FeedService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Paginator::default(),
        ));
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            storage.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(store.clone(), store.clone()));
        let sessions = Arc::new(SessionService::new(store.clone(), store.clone()));

        let state = HttpState {
            feed,
            posts,
            subscriptions,
            sessions,
            page_cache: Arc::new(PageCache::new(&cache)),
            cache,
            upload_storage: storage,
            health: store.clone(),
            auth: AuthSettings::default(),
            max_request_bytes: 10 * 1024 * 1024,
        };
        let router = http::build_router(state.clone());

        Self {
            store,
            state,
            router,
            _uploads: uploads,
        }
    }

    /// A `Cookie` header value signing in as `user`.
    pub async fn login(&self, user: &UserRecord) -> String {
        let issued = self
            .state
            .sessions
            .issue(&user.username)
            .await
            .expect("issue session");
        format!("{SESSION_COOKIE}={}", issued.token)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, path: &str, cookie: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: Option<&str>,
        parts: &[MultipartPart<'_>],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(
            builder
                .body(Body::from(multipart_body(parts)))
                .expect("request"),
        )
        .await
    }
}

pub enum MultipartPart<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_body(parts: &[MultipartPart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            MultipartPart::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            MultipartPart::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// The smallest valid GIF: one transparent pixel.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];
