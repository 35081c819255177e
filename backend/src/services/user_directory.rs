//! Relational reads (and the single token write) the live-sync engine needs
//! from the `users` table.

use crate::{db::DbPool, schema::users};
use async_trait::async_trait;
use diesel::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryError {
    Pool(String),
    Query(String),
    Task(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Pool(msg) => write!(f, "Database connection error: {}", msg),
            DirectoryError::Query(msg) => write!(f, "Database query error: {}", msg),
            DirectoryError::Task(msg) => write!(f, "Database task failed: {}", msg),
        }
    }
}

impl std::error::Error for DirectoryError {}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user's push token, if one is registered and non-empty
    async fn push_token(&self, user_id: i32) -> Result<Option<String>, DirectoryError>;

    /// Ids of every user with a registered push token, ascending
    async fn users_with_push_token(&self) -> Result<Vec<i32>, DirectoryError>;

    /// Register (or replace) a user's push token. Returns the number of
    /// users updated, 0 when the user does not exist.
    async fn set_push_token(&self, user_id: i32, token: &str) -> Result<usize, DirectoryError>;
}

/// Postgres-backed directory. Diesel is blocking, so every query runs on the
/// blocking thread pool.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, DirectoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| DirectoryError::Pool(e.to_string()))?;
            f(&mut conn).map_err(|e| DirectoryError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DirectoryError::Task(e.to_string()))?
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn push_token(&self, user_id: i32) -> Result<Option<String>, DirectoryError> {
        let token: Option<Option<String>> = self
            .with_conn(move |conn| {
                users::table
                    .filter(users::user_id.eq(user_id))
                    .select(users::fcm_token)
                    .first::<Option<String>>(conn)
                    .optional()
            })
            .await?;

        Ok(token.flatten().filter(|t| !t.trim().is_empty()))
    }

    async fn users_with_push_token(&self) -> Result<Vec<i32>, DirectoryError> {
        self.with_conn(|conn| {
            users::table
                .filter(users::fcm_token.is_not_null())
                .filter(users::fcm_token.ne(""))
                .select(users::user_id)
                .order(users::user_id.asc())
                .load::<i32>(conn)
        })
        .await
    }

    async fn set_push_token(&self, user_id: i32, token: &str) -> Result<usize, DirectoryError> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            diesel::update(users::table.filter(users::user_id.eq(user_id)))
                .set(users::fcm_token.eq(Some(token)))
                .execute(conn)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_error_display() {
        let err = DirectoryError::Pool("timed out".to_string());
        assert_eq!(err.to_string(), "Database connection error: timed out");
    }

    #[test]
    fn test_subscriber_query_sql() {
        let query = users::table
            .filter(users::fcm_token.is_not_null())
            .filter(users::fcm_token.ne(""))
            .select(users::user_id)
            .order(users::user_id.asc());
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string();

        assert!(sql.contains("\"users\".\"fcm_token\" IS NOT NULL"));
        assert!(sql.contains("\"users\".\"fcm_token\" != $1"));
        assert!(sql.contains("ORDER BY \"users\".\"user_id\" ASC"));
    }

    #[test]
    fn test_token_lookup_query_sql() {
        let query = users::table
            .filter(users::user_id.eq(7))
            .select(users::fcm_token)
            .limit(1);
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string();

        assert!(sql.contains("SELECT \"users\".\"fcm_token\" FROM \"users\""));
        assert!(sql.contains("\"users\".\"user_id\" = $1"));
    }
}
