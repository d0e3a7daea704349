use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{FollowsRepo, RepoError},
    domain::entities::{AuthorRef, FollowRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FollowRow {
    id: i64,
    created_at: OffsetDateTime,
    user_id: i64,
    user_username: String,
    user_display_name: String,
    author_id: i64,
    author_username: String,
    author_display_name: String,
}

impl From<FollowRow> for FollowRecord {
    fn from(row: FollowRow) -> Self {
        Self {
            id: row.id,
            user: AuthorRef {
                id: row.user_id,
                username: row.user_username,
                display_name: row.user_display_name,
            },
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
                display_name: row.author_display_name,
            },
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn create_follow(
        &self,
        user_id: i64,
        author_id: i64,
    ) -> Result<FollowRecord, RepoError> {
        let row = sqlx::query_as::<_, FollowRow>(
            r#"
            WITH inserted AS (
                INSERT INTO follows (user_id, author_id)
                VALUES ($1, $2)
                RETURNING id, user_id, author_id, created_at
            )
            SELECT i.id, i.created_at,
                   fu.id AS user_id, fu.username AS user_username,
                   fu.display_name AS user_display_name,
                   fa.id AS author_id, fa.username AS author_username,
                   fa.display_name AS author_display_name
            FROM inserted i
            INNER JOIN users fu ON fu.id = i.user_id
            INNER JOIN users fa ON fa.id = i.author_id
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(FollowRecord::from(row))
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}
