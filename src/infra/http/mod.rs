mod auth;
mod follow;
mod middleware;
mod posts;
mod public;

pub use auth::{CurrentUser, RequireUser, Viewer, login_location};

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
};
use sqlx::Error as SqlxError;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        feed::FeedService,
        posts::PostService,
        sessions::SessionService,
        subscriptions::SubscriptionService,
    },
    cache::{CacheConfig, CachePageState, INDEX_PAGE_PREFIX, PageCache, cache_page},
    config::AuthSettings,
    domain::entities::UserRecord,
    infra::{db::PostgresRepositories, uploads::UploadStorage},
    presentation::views::{
        ErrorPageView, ErrorTemplate, LayoutChrome, LayoutContext, render_template_response,
    },
};

use self::middleware::{log_responses, set_request_context};

/// Liveness of the backing store, reported by `/_health/db`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), SqlxError>;
}

#[async_trait]
impl HealthProbe for PostgresRepositories {
    async fn ping(&self) -> Result<(), SqlxError> {
        self.health_check().await
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub sessions: Arc<SessionService>,
    pub page_cache: Arc<PageCache>,
    pub cache: CacheConfig,
    pub upload_storage: Arc<UploadStorage>,
    pub health: Arc<dyn HealthProbe>,
    pub auth: AuthSettings,
    pub max_request_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    let index_routes = Router::new().route("/", get(public::index));
    let index_routes = if state.cache.enabled {
        index_routes.layer(from_fn_with_state(
            CachePageState {
                cache: state.page_cache.clone(),
                prefix: INDEX_PAGE_PREFIX,
                max_body_bytes: state.cache.max_body_bytes,
            },
            cache_page,
        ))
    } else {
        index_routes
    };

    let form_routes = Router::new()
        .route("/create/", get(posts::create_form).post(posts::create_submit))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .layer(DefaultBodyLimit::max(state.max_request_bytes));

    Router::new()
        .merge(index_routes)
        .merge(form_routes)
        .route("/group/{slug}/", get(public::group_posts))
        .route("/profile/{username}/", get(public::profile))
        .route("/profile/{username}/follow/", get(follow::profile_follow))
        .route("/profile/{username}/unfollow/", get(follow::profile_unfollow))
        .route("/posts/{id}/", get(public::post_detail))
        .route("/posts/{id}/comment/", axum::routing::post(posts::add_comment))
        .route("/follow/", get(follow::follow_index))
        .route("/about/author/", get(public::about_author))
        .route("/about/tech/", get(public::about_tech))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::db_health))
        .fallback(public::fallback)
        .layer(from_fn(log_responses))
        .layer(from_fn_with_state(state.clone(), auth::resolve_viewer))
        .layer(from_fn(set_request_context))
        .with_state(state)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Post ids arrive as raw path segments; anything but an integer is a 404.
fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

/// HTML rendering of a failed request. Server errors get the generic error
/// page; everything else keeps the plain response.
fn error_page(err: HttpError, viewer: Option<&UserRecord>) -> Response {
    let status = err.status();
    if !status.is_server_error() {
        return err.into_response();
    }

    let content = ErrorPageView::server_error();
    let chrome = LayoutChrome::new(content.title.clone(), "", viewer);
    let mut response =
        render_template_response(ErrorTemplate { view: LayoutContext::new(chrome, content) }, status);
    err.report().clone().attach(&mut response);
    response
}
