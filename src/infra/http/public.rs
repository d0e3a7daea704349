use std::{convert::Infallible, io::ErrorKind};

use axum::{
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::{
        HeaderValue, Method, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::error;
use url::form_urlencoded;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        feed::FeedError,
        pagination::PageNumber,
        posts::PostError,
    },
    domain::entities::UserRecord,
    infra::uploads::UploadStorageError,
    presentation::views::{
        AboutTemplate, AboutView, FeedView, GroupPageView, GroupTemplate, IndexTemplate,
        IndexView, LayoutChrome, LayoutContext, PostCard, PostDetailTemplate, PostDetailView,
        ProfileTemplate, ProfileView, CommentView, post_href, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{HttpState, Viewer, db_health_response, error_page, parse_post_id};

/// The `?page=` value of the request. Repeated keys resolve to the last one
/// and malformed query strings fall back to the first page.
#[derive(Debug, Clone, Copy)]
pub(super) struct PageParam(pub(super) PageNumber);

impl<S> FromRequestParts<S> for PageParam
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(page_number(parts.uri.query())))
    }
}

fn page_number(query: Option<&str>) -> PageNumber {
    let raw = query.and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == "page")
            .map(|(_, value)| value.into_owned())
            .last()
    });
    PageNumber::parse(raw.as_deref())
}

/// Home feed. Rendered without viewer-specific chrome since the response is
/// shared through the page cache. The cache is cleared on every GET render;
/// the cache layer stores this response afterwards. HEAD requests are never
/// stored, so they leave the cache alone.
pub(super) async fn index(
    State(state): State<HttpState>,
    method: Method,
    PageParam(page): PageParam,
) -> Response {
    let response = match state.feed.index_page(page).await {
        Ok(page) => {
            let chrome = LayoutChrome::new("Latest posts", "/", None);
            let content = IndexView {
                feed: FeedView::new(&page, "/", "No posts yet."),
            };
            render_template_response(
                IndexTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, "/", None),
    };

    if method == Method::GET {
        state.page_cache.clear();
    }
    response
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Viewer(viewer): Viewer,
    PageParam(page): PageParam,
    uri: Uri,
) -> Response {
    match state.feed.group_page(&slug, page).await {
        Ok(feed) => {
            let chrome = LayoutChrome::new(feed.group.title.clone(), uri.path(), viewer.as_ref());
            let content = GroupPageView::new(&feed.group, &feed.page);
            render_template_response(
                GroupTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, uri.path(), viewer.as_ref()),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    Viewer(viewer): Viewer,
    PageParam(page): PageParam,
    uri: Uri,
) -> Response {
    match state
        .feed
        .profile_page(&username, viewer.as_ref(), page)
        .await
    {
        Ok(profile) => {
            let author = profile.author.as_author();
            let label = author.label().to_string();
            let base = profile_href(&profile.author.username);
            let content = ProfileView {
                label: label.clone(),
                username: profile.author.username.clone(),
                post_count: profile.page.total_count,
                following: profile.following,
                show_follow_controls: viewer.is_some() && !profile.is_self,
                follow_href: format!("{base}follow/"),
                unfollow_href: format!("{base}unfollow/"),
                feed: FeedView::new(&profile.page, &base, "This author has not posted yet."),
            };
            let chrome = LayoutChrome::new(
                format!("Profile of {label}"),
                uri.path(),
                viewer.as_ref(),
            );
            render_template_response(
                ProfileTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, uri.path(), viewer.as_ref()),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
    Viewer(viewer): Viewer,
    uri: Uri,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return not_found(uri.path(), viewer.as_ref());
    };

    match state.posts.post_detail(id, viewer.as_ref()).await {
        Ok(detail) => {
            let title = detail.post.text.chars().take(30).collect::<String>();
            let content = PostDetailView {
                post: PostCard::from(&detail.post),
                author_post_count: detail.author_post_count,
                edit_href: detail.is_author.then(|| format!("{}edit/", post_href(id))),
                comment_action: format!("{}comment/", post_href(id)),
                can_comment: viewer.is_some(),
                comments: detail.comments.iter().map(CommentView::from).collect(),
            };
            let chrome = LayoutChrome::new(format!("Post {title}"), uri.path(), viewer.as_ref());
            render_template_response(
                PostDetailTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => post_error_response(err, uri.path(), viewer.as_ref()),
    }
}

pub(super) async fn about_author(Viewer(viewer): Viewer, uri: Uri) -> Response {
    about_page(AboutView::author(), uri.path(), viewer.as_ref())
}

pub(super) async fn about_tech(Viewer(viewer): Viewer, uri: Uri) -> Response {
    about_page(AboutView::tech(), uri.path(), viewer.as_ref())
}

fn about_page(content: AboutView, path: &str, viewer: Option<&UserRecord>) -> Response {
    let chrome = LayoutChrome::new(content.title.clone(), path, viewer);
    render_template_response(
        AboutTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => media_not_found(SOURCE),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            media_not_found(SOURCE)
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn media_not_found(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Image not found",
        "The requested image is not available",
    )
    .into_response()
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

pub(super) async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

pub(super) async fn fallback(Viewer(viewer): Viewer, uri: Uri) -> Response {
    not_found(uri.path(), viewer.as_ref())
}

pub(super) fn not_found(path: &str, viewer: Option<&UserRecord>) -> Response {
    render_not_found_response(LayoutChrome::new("Page not found", path, viewer), path)
}

pub(super) fn feed_error_response(
    err: FeedError,
    path: &str,
    viewer: Option<&UserRecord>,
) -> Response {
    match err {
        FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) => {
            let mut response = not_found(path, viewer);
            ErrorReport::from_error(
                "infra::http::public::feed_error_response",
                StatusCode::NOT_FOUND,
                &err,
            )
            .attach(&mut response);
            response
        }
        err => error_page(HttpError::from(err), viewer),
    }
}

pub(super) fn post_error_response(
    err: PostError,
    path: &str,
    viewer: Option<&UserRecord>,
) -> Response {
    match err {
        PostError::NotFound => not_found(path, viewer),
        err => error_page(HttpError::from(err), viewer),
    }
}
