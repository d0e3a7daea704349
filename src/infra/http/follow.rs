//! Subscription feed and follow toggles.

use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{error::HttpError, subscriptions::SubscriptionError},
    domain::entities::UserRecord,
    presentation::views::{
        FeedView, FollowTemplate, FollowView, LayoutChrome, LayoutContext,
        render_template_response,
    },
};

use super::{HttpState, RequireUser, error_page, public, public::PageParam};

const FOLLOW_FEED_PATH: &str = "/follow/";

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    PageParam(page): PageParam,
) -> Response {
    match state.feed.follow_page(&user, page).await {
        Ok(page) => {
            let chrome = LayoutChrome::new("Subscriptions", FOLLOW_FEED_PATH, Some(&user));
            let content = FollowView {
                feed: FeedView::new(
                    &page,
                    FOLLOW_FEED_PATH,
                    "Authors you follow have not posted anything yet.",
                ),
            };
            render_template_response(
                FollowTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => public::feed_error_response(err, FOLLOW_FEED_PATH, Some(&user)),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.subscriptions.follow(&user, &username).await {
        Ok(_) | Err(SubscriptionError::AlreadyFollowing { .. }) => {
            Redirect::to(FOLLOW_FEED_PATH).into_response()
        }
        Err(err) => subscription_error_response(err, uri.path(), &user),
    }
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.subscriptions.unfollow(&user, &username).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => subscription_error_response(err, uri.path(), &user),
    }
}

fn subscription_error_response(err: SubscriptionError, path: &str, user: &UserRecord) -> Response {
    match err {
        SubscriptionError::UnknownAuthor(_) => public::not_found(path, Some(user)),
        err => error_page(HttpError::from(err), Some(user)),
    }
}
