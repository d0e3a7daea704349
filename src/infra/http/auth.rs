//! Cookie sessions and the extractors that read them.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, Uri, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::domain::entities::UserRecord;

use super::HttpState;

/// The user behind the request's session cookie, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

pub async fn resolve_viewer(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(&state.auth.session_cookie) {
        match state.sessions.authenticate(cookie.value()).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => {
                debug!(
                    target = "inkpost::http::auth",
                    "session cookie did not match a session"
                );
            }
            Err(err) => {
                warn!(
                    target = "inkpost::http::auth",
                    error = %err,
                    "session lookup failed; continuing anonymously"
                );
            }
        }
    }

    next.run(request).await
}

/// The signed-in user, if any.
pub struct Viewer(pub Option<UserRecord>);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<CurrentUser>()
                .map(|current| current.0.clone()),
        ))
    }
}

/// A signed-in user. Anonymous requests are redirected to the login page
/// with the original path in `next`.
pub struct RequireUser(pub UserRecord);

impl FromRequestParts<HttpState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(current) => Ok(Self(current.0.clone())),
            None => Err(login_redirect(&state.auth.login_path, &parts.uri)),
        }
    }
}

fn login_redirect(login_path: &str, uri: &Uri) -> Response {
    let next = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    Redirect::to(&login_location(login_path, next)).into_response()
}

/// `{login_path}?next={next}` with `next` query-encoded, slashes kept readable.
pub fn login_location(login_path: &str, next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{login_path}?next={}", encoded.replace("%2F", "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_location_keeps_path_readable() {
        assert_eq!(
            login_location("/auth/login/", "/create/"),
            "/auth/login/?next=/create/"
        );
        assert_eq!(
            login_location("/auth/login/", "/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
    }
}
