//! Anonymous visitors are sent to the login page for member-only routes.

mod support;

use axum::http::StatusCode;

use support::{MultipartPart, SESSION_COOKIE, TestApp};

#[tokio::test]
async fn member_pages_redirect_anonymous_visitors_to_login() {
    let app = TestApp::new();
    let author = app.store.insert_user("PostAuthor");
    let id = app.store.insert_post(&author, "Guarded", None);

    let cases = [
        "/create/".to_string(),
        "/follow/".to_string(),
        format!("/posts/{id}/edit/"),
        "/profile/PostAuthor/follow/".to_string(),
        "/profile/PostAuthor/unfollow/".to_string(),
    ];

    for path in cases {
        let response = app.get(&path, None).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "path {path}");
        assert_eq!(
            response.location(),
            Some(format!("/auth/login/?next={path}").as_str()),
            "path {path}"
        );
    }
}

#[tokio::test]
async fn anonymous_submissions_change_nothing() {
    let app = TestApp::new();
    let author = app.store.insert_user("PostAuthor");
    let id = app.store.insert_post(&author, "Guarded", None);

    let create = app
        .post_multipart(
            "/create/",
            None,
            &[MultipartPart::Text("text", "Sneaky post")],
        )
        .await;
    assert_eq!(create.status, StatusCode::SEE_OTHER);
    assert_eq!(create.location(), Some("/auth/login/?next=/create/"));
    assert_eq!(app.store.post_count(), 1);

    let comment = app
        .post_form(&format!("/posts/{id}/comment/"), None, "text=Sneaky")
        .await;
    assert_eq!(comment.status, StatusCode::SEE_OTHER);
    assert_eq!(app.store.comment_count(id), 0);
}

#[tokio::test]
async fn unknown_session_token_is_treated_as_anonymous() {
    let app = TestApp::new();
    let cookie = format!("{SESSION_COOKIE}=ip_{}", "0".repeat(64));

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/auth/login/?next=/create/"));
}

#[tokio::test]
async fn valid_session_opens_create_form() {
    let app = TestApp::new();
    let user = app.store.insert_user("auth");
    app.store.insert_group("Test group", "test_group");
    let cookie = app.login(&user).await;

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("enctype=\"multipart/form-data\""));
    assert!(response.body.contains(">Test group</option>"));
    assert!(response.body.contains("Signed in as"));
}
