//! Persistence ports and their SQLite adapter.
//!
//! Services compute ids, hashes and validation; repositories only persist.
//! Every todo query that serves a request is filtered by owner in SQL.

use crate::entities::{Todo, Token, User};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn insert(&self, owner: Uuid, title: &str) -> Result<Todo>;
    /// Load a todo by id regardless of owner. Used only for ownership checks.
    async fn find_by_id(&self, id: i64) -> Result<Option<Todo>>;
    async fn find_owned(&self, owner: Uuid, id: i64) -> Result<Option<Todo>>;
    /// All todos of `owner` in insertion order.
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Todo>>;
    /// Returns the updated row, or None if no todo with that id is owned by `owner`.
    async fn update_title_owned(&self, owner: Uuid, id: i64, title: &str) -> Result<Option<Todo>>;
    /// Returns true if a row was deleted.
    async fn delete_owned(&self, owner: Uuid, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn insert(&self, user: &User) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Fails with `Conflict` when the new email is taken.
    async fn update(&self, user: &User) -> Result<()>;
    /// Removes the user together with their todos and tokens.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<()>;
    async fn find(&self, token: &str) -> Result<Option<Token>>;
    async fn delete(&self, token: &str) -> Result<bool>;
    /// Drop every token that expired at or before `now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

const EMAIL_TAKEN: &str = "email is already registered";

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pub sqlite_pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(sqlite_pool: SqlitePool) -> Self {
        Self { sqlite_pool }
    }
}

#[async_trait]
impl TodoRepository for SqliteRepository {
    async fn insert(&self, owner: Uuid, title: &str) -> Result<Todo> {
        let todo = sqlx::query_as::<_, Todo>(
            "INSERT INTO todos (title, user_id) VALUES (?, ?) RETURNING id, title, user_id",
        )
        .bind(title)
        .bind(owner)
        .fetch_one(&self.sqlite_pool)
        .await?;
        Ok(todo)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Todo>> {
        let todo = sqlx::query_as("SELECT id, title, user_id FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.sqlite_pool)
            .await?;
        Ok(todo)
    }

    async fn find_owned(&self, owner: Uuid, id: i64) -> Result<Option<Todo>> {
        let todo =
            sqlx::query_as("SELECT id, title, user_id FROM todos WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.sqlite_pool)
                .await?;
        Ok(todo)
    }

    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Todo>> {
        let todos =
            sqlx::query_as("SELECT id, title, user_id FROM todos WHERE user_id = ? ORDER BY id")
                .bind(owner)
                .fetch_all(&self.sqlite_pool)
                .await?;
        Ok(todos)
    }

    async fn update_title_owned(&self, owner: Uuid, id: i64, title: &str) -> Result<Option<Todo>> {
        let todo = sqlx::query_as(
            "UPDATE todos SET title = ? WHERE id = ? AND user_id = ? RETURNING id, title, user_id",
        )
        .bind(title)
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.sqlite_pool)
        .await?;
        Ok(todo)
    }

    async fn delete_owned(&self, owner: Uuid, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.sqlite_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, name, email, password_hash) VALUES (?, ?, ?, ?)")
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .execute(&self.sqlite_pool)
            .await
            .map_err(|e| Error::from_write(e, EMAIL_TAKEN))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as("SELECT id, name, email, password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.sqlite_pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user =
            sqlx::query_as("SELECT id, name, email, password_hash FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.sqlite_pool)
                .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET name = ?, email = ?, password_hash = ? WHERE id = ?")
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.id)
                .execute(&self.sqlite_pool)
                .await
                .map_err(|e| Error::from_write(e, EMAIL_TAKEN))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("user"));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.sqlite_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenRepository for SqliteRepository {
    async fn insert(&self, token: &Token) -> Result<()> {
        sqlx::query("INSERT INTO tokens (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&token.token)
            .bind(token.user_id)
            .bind(token.created_at)
            .bind(token.expires_at)
            .execute(&self.sqlite_pool)
            .await?;
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<Token>> {
        let token = sqlx::query_as(
            "SELECT token, user_id, created_at, expires_at FROM tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.sqlite_pool)
        .await?;
        Ok(token)
    }

    async fn delete(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tokens WHERE token = ?")
            .bind(token)
            .execute(&self.sqlite_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        // timestamps are stored as RFC 3339 text in UTC, which sorts chronologically
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.sqlite_pool)
            .await?;
        Ok(result.rows_affected())
    }
}
