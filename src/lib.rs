//! Multi-user to-do backend: bearer-token authenticated CRUD over SQLite.

pub mod authentication;
pub mod config;
pub mod crud_ops;
pub mod db;
pub mod entities;
pub mod error;
pub mod logging;
pub mod repo;
pub mod seed;
pub mod service;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::AppConfig;
pub use error::{Error, Result};

use crate::repo::SqliteRepository;
use crate::service::TodoService;
use crate::users::UserService;

/// Services shared by every request.
#[derive(Clone)]
pub struct Services {
    pub todos: Arc<TodoService>,
    pub users: Arc<UserService>,
}

impl Services {
    pub fn new(sqlite_pool: SqlitePool, config: &AppConfig) -> Self {
        let repo = Arc::new(SqliteRepository::new(sqlite_pool));
        Self {
            todos: Arc::new(TodoService::new(repo.clone(), config.todos.clone())),
            users: Arc::new(UserService::new(
                repo.clone(),
                repo,
                config.users.clone(),
                config.auth.clone(),
            )),
        }
    }
}

pub fn router(services: Services) -> Router {
    use authentication::{delete_me, login, logout, me, register, update_me};
    use crud_ops::{create_todo, delete_todo, get_todo, get_todos, update_todo};

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/me", get(me).put(update_me).delete(delete_me))
        .route("/todos", post(create_todo).get(get_todos))
        .route(
            "/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .layer(Extension(services.todos))
        .layer(Extension(services.users))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

pub async fn run_server(config: &AppConfig) -> anyhow::Result<()> {
    let sqlite_pool = db::connect(&config.database).await?;
    let app = router(Services::new(sqlite_pool, config));

    let listener = TcpListener::bind(config.bind_addr()).await?;
    serve(listener, app).await?;
    Ok(())
}
