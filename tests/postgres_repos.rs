//! Repository behaviour against a live Postgres. These need `DATABASE_URL`
//! and run with `cargo test -- --ignored`.

use inkpost::{
    application::{
        pagination::{PageNumber, Paginator},
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateUserParams, FeedScope, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo,
            RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    domain::entities::{GroupRecord, UserRecord},
    infra::db::PostgresRepositories,
};
use sqlx::PgPool;

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            display_name: String::new(),
        })
        .await
        .expect("create user")
}

async fn group(repos: &PostgresRepositories, slug: &str) -> GroupRecord {
    repos
        .create_group(CreateGroupParams {
            title: format!("Group {slug}"),
            slug: slug.to_string(),
            description: String::new(),
        })
        .await
        .expect("create group")
}

async fn post(
    repos: &PostgresRepositories,
    author: &UserRecord,
    text: &str,
    group_id: Option<i64>,
) -> i64 {
    repos
        .create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id,
            image: None,
        })
        .await
        .expect("create post")
        .id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn group_scope_pages_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "PostAuthor").await;
    let group = group(&repos, "test_group").await;
    for number in 1..=13 {
        post(&repos, &author, &format!("Post {number}"), Some(group.id)).await;
    }
    post(&repos, &author, "Outside the group", None).await;

    let scope = FeedScope::Group(group.id);
    let total = repos.count_posts(scope).await.expect("count");
    assert_eq!(total, 13);

    let paginator = Paginator::default();
    let first = repos
        .list_posts(scope, paginator.window(total, PageNumber::FIRST))
        .await
        .expect("first page");
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].text, "Post 13");
    assert_eq!(first[0].group.as_ref().map(|g| g.slug.as_str()), Some("test_group"));

    let second = repos
        .list_posts(scope, paginator.window(total, PageNumber::new(2)))
        .await
        .expect("second page");
    assert_eq!(second.len(), 3);
    assert_eq!(second[0].text, "Post 3");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn update_can_clear_group(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "PostAuthor").await;
    let group = group(&repos, "test_group").await;
    let id = post(&repos, &author, "Original", Some(group.id)).await;

    let updated = repos
        .update_post(UpdatePostParams {
            id,
            text: "Edited".to_string(),
            group_id: None,
            image: None,
        })
        .await
        .expect("update");
    assert_eq!(updated.text, "Edited");
    assert!(updated.group.is_none());

    let missing = repos
        .update_post(UpdatePostParams {
            id: id + 1000,
            text: "Nobody".to_string(),
            group_id: None,
            image: None,
        })
        .await;
    assert!(matches!(missing, Err(RepoError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn follow_pairs_are_unique_and_drive_followed_scope(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let reader = user(&repos, "Reader").await;
    let author = user(&repos, "PostAuthor").await;
    let other = user(&repos, "Other").await;
    post(&repos, &author, "Followed", None).await;
    post(&repos, &other, "Unfollowed", None).await;

    let edge = repos
        .create_follow(reader.id, author.id)
        .await
        .expect("follow");
    assert_eq!(edge.author.username, "PostAuthor");

    let duplicate = repos.create_follow(reader.id, author.id).await;
    assert!(matches!(duplicate, Err(RepoError::Duplicate { .. })));

    assert!(repos.is_following(reader.id, author.id).await.expect("is following"));
    assert_eq!(repos.count_following(reader.id).await.expect("count"), 1);

    let feed = repos
        .list_all_posts(FeedScope::FollowedBy(reader.id))
        .await
        .expect("followed feed");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].text, "Followed");

    assert_eq!(repos.delete_follow(reader.id, author.id).await.expect("delete"), 1);
    assert_eq!(repos.delete_follow(reader.id, author.id).await.expect("delete"), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn comments_and_sessions_round_through_storage(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "PostAuthor").await;
    let id = post(&repos, &author, "Discuss", None).await;

    repos
        .create_comment(CreateCommentParams {
            post_id: id,
            author_id: author.id,
            text: "First".to_string(),
        })
        .await
        .expect("comment");
    let comments = repos.list_for_post(id).await.expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author.username, "PostAuthor");

    let digest = "a".repeat(64);
    repos
        .create_session(author.id, &digest)
        .await
        .expect("session");
    let resolved = repos
        .find_user_by_token_hash(&digest)
        .await
        .expect("lookup");
    assert_eq!(resolved.map(|user| user.id), Some(author.id));

    let duplicate = repos
        .create_user(CreateUserParams {
            username: "PostAuthor".to_string(),
            display_name: String::new(),
        })
        .await;
    assert!(matches!(duplicate, Err(RepoError::Duplicate { .. })));

    assert!(PostsRepo::find_by_id(&repos, id).await.expect("find").is_some());
}
