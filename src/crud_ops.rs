use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::authentication::AuthUser;
use crate::entities::{TodoPublic, TodoRequest};
use crate::error::{ApiJson, ApiPath, Error};
use crate::service::TodoService;

pub async fn create_todo(
    Extension(todos): Extension<Arc<TodoService>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<TodoRequest>,
) -> Result<impl IntoResponse, Error> {
    let todo = todos.create(&auth.user, &req.title).await?;
    Ok((StatusCode::CREATED, Json(todo.public())))
}

pub async fn get_todo(
    Extension(todos): Extension<Arc<TodoService>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<TodoPublic>, Error> {
    let todo = todos.get_one(&auth.user, id).await?;
    Ok(Json(todo.public()))
}

pub async fn get_todos(
    Extension(todos): Extension<Arc<TodoService>>,
    auth: AuthUser,
) -> Result<Json<Vec<TodoPublic>>, Error> {
    let todos = todos.get_all(&auth.user).await?;
    Ok(Json(todos.into_iter().map(|t| t.public()).collect()))
}

pub async fn update_todo(
    Extension(todos): Extension<Arc<TodoService>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<TodoRequest>,
) -> Result<Json<TodoPublic>, Error> {
    let todo = todos.update(&auth.user, id, &req.title).await?;
    Ok(Json(todo.public()))
}

pub async fn delete_todo(
    Extension(todos): Extension<Arc<TodoService>>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, Error> {
    todos.delete(&auth.user, id).await?;
    Ok(StatusCode::OK)
}
