use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub user_id: Uuid,
}

/// Response shape for a todo. Owner id stays server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPublic {
    pub id: i64,
    pub title: String,
}

impl Todo {
    pub fn public(self) -> TodoPublic {
        TodoPublic {
            id: self.id,
            title: self.title,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TodoRequest {
    pub title: String,
}

// password_hash is intentionally not Serialize; use `User::public` for responses
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublic {
    pub name: Option<String>,
    pub email: String,
}

impl User {
    pub fn public(&self) -> UserPublic {
        UserPublic {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Token {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            token: token.token,
            expires_at: token.expires_at,
        }
    }
}
