//! Page cache middleware.
//!
//! Replays stored GET responses and stores fresh 200 responses after the
//! handler has run. Handlers may clear the cache while rendering; the
//! response they produce is still stored afterwards.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::{
    keys::PageKey,
    store::{CachedResponse, PageCache},
};

/// Layer state: the shared store plus the key prefix for the wrapped route.
#[derive(Clone)]
pub struct CachePageState {
    pub cache: Arc<PageCache>,
    pub prefix: &'static str,
    pub max_body_bytes: usize,
}

#[instrument(skip_all, fields(path = %request.uri().path(), prefix = state.prefix))]
pub async fn cache_page(
    State(state): State<CachePageState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = PageKey::new(state.prefix, request.uri().path(), request.uri().query());

    if let Some(cached) = state.cache.get(&key) {
        debug!(cache = "page", outcome = "hit", "serving cached page");
        return build_response(cached);
    }

    debug!(cache = "page", outcome = "miss", "rendering page");

    let response = next.run(request).await;

    if response.status() != StatusCode::OK || response.headers().contains_key(header::SET_COOKIE)
    {
        return response;
    }

    let within_limit = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= state.max_body_bytes as u64);
    if !within_limit {
        debug!(
            cache = "page",
            max_body_bytes = state.max_body_bytes,
            "page body exceeds cache limit, passing through"
        );
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to collect page body for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };
    state.cache.put(key, cached);

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, middleware::from_fn_with_state, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::{CacheConfig, keys::INDEX_PAGE_PREFIX};

    fn router(hits: Arc<AtomicUsize>, cache: Arc<PageCache>) -> Router {
        router_with_limit(hits, cache, 1024)
    }

    fn router_with_limit(
        hits: Arc<AtomicUsize>,
        cache: Arc<PageCache>,
        max_body_bytes: usize,
    ) -> Router {
        let state = CachePageState {
            cache,
            prefix: INDEX_PAGE_PREFIX,
            max_body_bytes,
        };
        Router::new()
            .route(
                "/",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                        format!("render {n}")
                    }
                }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(from_fn_with_state(state, cache_page))
    }

    async fn body_of(router: &Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn second_read_is_replayed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let app = router(hits.clone(), cache.clone());

        let (_, first) = body_of(&app, "/").await;
        let (_, second) = body_of(&app, "/").await;
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        cache.clear();
        let (_, third) = body_of(&app, "/").await;
        assert_eq!(third, "render 2");
    }

    #[tokio::test]
    async fn query_string_is_part_of_the_key() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let app = router(hits.clone(), cache);

        body_of(&app, "/").await;
        body_of(&app, "/?page=2").await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn oversized_bodies_pass_through_uncached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let app = router_with_limit(hits.clone(), cache.clone(), 4);

        let (status, body) = body_of(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "render 1");
        assert!(cache.is_empty());

        let (_, again) = body_of(&app, "/").await;
        assert_eq!(again, "render 2");
    }

    #[tokio::test]
    async fn head_requests_are_not_stored() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let app = router(hits, cache.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::HEAD)
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn non_ok_responses_are_not_stored() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(PageCache::new(&CacheConfig::default()));
        let app = router(hits, cache.clone());

        let (status, _) = body_of(&app, "/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(cache.is_empty());
    }
}
