use std::sync::Arc;

use crate::config::TodosConfig;
use crate::entities::{Todo, User};
use crate::error::{Error, Result};
use crate::repo::TodoRepository;
use tracing::{debug, info, instrument, warn};

/// Todo operations, always scoped to the requesting user.
///
/// The caller passes the authenticated [`User`] explicitly; there is no ambient identity.
#[derive(Clone)]
pub struct TodoService {
    repo: Arc<dyn TodoRepository>,
    config: TodosConfig,
}

impl TodoService {
    pub fn new(repo: Arc<dyn TodoRepository>, config: TodosConfig) -> Self {
        Self { repo, config }
    }

    #[instrument(name = "todos.create", skip(self, user, title), fields(user_id = %user.id))]
    pub async fn create(&self, user: &User, title: &str) -> Result<Todo> {
        self.validate_title(title)?;
        let todo = self.repo.insert(user.id, title).await?;
        info!(todo_id = todo.id, "todo created");
        Ok(todo)
    }

    #[instrument(name = "todos.get_one", skip(self, user), fields(user_id = %user.id))]
    pub async fn get_one(&self, user: &User, id: i64) -> Result<Todo> {
        self.repo
            .find_owned(user.id, id)
            .await?
            .ok_or_else(|| Error::not_found("todo"))
    }

    #[instrument(name = "todos.get_all", skip(self, user), fields(user_id = %user.id))]
    pub async fn get_all(&self, user: &User) -> Result<Vec<Todo>> {
        let todos = self.repo.list_owned(user.id).await?;
        debug!(count = todos.len(), "listed todos");
        Ok(todos)
    }

    /// Replace the title of one of the user's todos.
    ///
    /// The todo is resolved before the title is validated, so an unknown id is 404
    /// whatever the body. A todo owned by someone else is reported as not found, same
    /// as `get_one`.
    #[instrument(name = "todos.update", skip(self, user, title), fields(user_id = %user.id))]
    pub async fn update(&self, user: &User, id: i64, title: &str) -> Result<Todo> {
        self.get_one(user, id).await?;
        self.validate_title(title)?;
        let todo = self
            .repo
            .update_title_owned(user.id, id, title)
            .await?
            .ok_or_else(|| Error::not_found("todo"))?;
        info!(todo_id = todo.id, "todo updated");
        Ok(todo)
    }

    #[instrument(name = "todos.delete", skip(self, user), fields(user_id = %user.id))]
    pub async fn delete(&self, user: &User, id: i64) -> Result<()> {
        let todo = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("todo"))?;

        if todo.user_id != user.id {
            warn!(todo_id = id, "delete refused: requester is not the owner");
            return Err(Error::Forbidden);
        }

        // owner filter again in case the row changed hands between the two statements
        if !self.repo.delete_owned(user.id, id).await? {
            return Err(Error::not_found("todo"));
        }
        info!(todo_id = id, "todo deleted");
        Ok(())
    }

    fn validate_title(&self, title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(Error::validation("title", "must not be empty"));
        }
        let len = title.chars().count();
        if len > self.config.max_title_length {
            return Err(Error::validation(
                "title",
                format!(
                    "too long: {len} characters (max: {})",
                    self.config.max_title_length
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{SqliteRepository, UserRepository};
    use uuid::Uuid;

    struct Fixture {
        service: TodoService,
        users: Arc<dyn UserRepository>,
    }

    async fn fixture() -> Fixture {
        let pool = crate::db::connect_in_memory().await.unwrap();
        let repo = Arc::new(SqliteRepository::new(pool));
        Fixture {
            service: TodoService::new(repo.clone(), TodosConfig::default()),
            users: repo,
        }
    }

    async fn user(fx: &Fixture, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: None,
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
        };
        fx.users.insert(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn create_then_get_one_returns_owned_todo() {
        let fx = fixture().await;
        let u1 = user(&fx, "u1@example.com").await;
        let u2 = user(&fx, "u2@example.com").await;

        let created = fx.service.create(&u1, "buy milk").await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.title, "buy milk");
        assert_eq!(created.user_id, u1.id);

        let fetched = fx.service.get_one(&u1, created.id).await.unwrap();
        assert_eq!(fetched, created);

        let err = fx.service.get_one(&u2, created.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_rejects_blank_and_oversized_titles() {
        let fx = fixture().await;
        let u = user(&fx, "u@example.com").await;

        for title in ["", "   ", "\t\n"] {
            let err = fx.service.create(&u, title).await.unwrap_err();
            assert!(matches!(err, Error::Validation { .. }), "title {title:?}");
        }

        let long = "x".repeat(TodosConfig::default().max_title_length + 1);
        assert!(matches!(
            fx.service.create(&u, &long).await.unwrap_err(),
            Error::Validation { .. }
        ));
        assert!(fx.service.get_all(&u).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_all_only_returns_own_todos_in_insertion_order() {
        let fx = fixture().await;
        let u1 = user(&fx, "u1@example.com").await;
        let u2 = user(&fx, "u2@example.com").await;

        for (owner, title) in [(&u1, "a"), (&u2, "b"), (&u1, "c"), (&u2, "d"), (&u1, "e")] {
            fx.service.create(owner, title).await.unwrap();
        }

        let mine = fx.service.get_all(&u1).await.unwrap();
        assert!(mine.iter().all(|t| t.user_id == u1.id));
        let titles: Vec<_> = mine.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a", "c", "e"]);

        let theirs = fx.service.get_all(&u2).await.unwrap();
        assert!(theirs.iter().all(|t| t.user_id == u2.id));
        assert_eq!(theirs.len(), 2);
    }

    #[tokio::test]
    async fn update_with_empty_title_keeps_stored_title() {
        let fx = fixture().await;
        let u = user(&fx, "u@example.com").await;
        let todo = fx.service.create(&u, "original").await.unwrap();

        let err = fx.service.update(&u, todo.id, "").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(
            fx.service.get_one(&u, todo.id).await.unwrap().title,
            "original"
        );

        let updated = fx.service.update(&u, todo.id, "renamed").await.unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.user_id, u.id);
    }

    #[tokio::test]
    async fn update_by_non_owner_is_not_found_and_leaves_todo() {
        let fx = fixture().await;
        let owner = user(&fx, "owner@example.com").await;
        let intruder = user(&fx, "intruder@example.com").await;
        let todo = fx.service.create(&owner, "mine").await.unwrap();

        let err = fx.service.update(&intruder, todo.id, "hijacked").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(fx.service.get_one(&owner, todo.id).await.unwrap().title, "mine");

        let err = fx.service.update(&owner, 999, "nothing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_resolves_todo_before_validating_title() {
        let fx = fixture().await;
        let owner = user(&fx, "owner@example.com").await;
        let intruder = user(&fx, "intruder@example.com").await;
        let todo = fx.service.create(&owner, "mine").await.unwrap();

        let err = fx.service.update(&owner, 999, "").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = fx.service.update(&intruder, todo.id, "").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = fx.service.update(&owner, todo.id, "").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn delete_by_non_owner_is_forbidden() {
        let fx = fixture().await;
        let owner = user(&fx, "owner@example.com").await;
        let intruder = user(&fx, "intruder@example.com").await;
        let todo = fx.service.create(&owner, "keep me").await.unwrap();

        let err = fx.service.delete(&intruder, todo.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden));

        let remaining = fx.service.get_all(&owner).await.unwrap();
        assert_eq!(remaining, vec![todo.clone()]);

        fx.service.delete(&owner, todo.id).await.unwrap();
        assert!(fx.service.get_all(&owner).await.unwrap().is_empty());

        let err = fx.service.delete(&owner, todo.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
