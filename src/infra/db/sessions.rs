use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, SessionsRepo},
    domain::entities::UserRecord,
};

use super::{PostgresRepositories, map_sqlx_error, users::UserRow};

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn find_user_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.username, u.display_name, u.joined_at
            FROM sessions s
            INNER JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn create_session(&self, user_id: i64, token_hash: &str) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id) VALUES ($1, $2)")
            .bind(token_hash)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
