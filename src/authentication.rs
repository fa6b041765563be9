use std::sync::Arc;

use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::entities::{Credentials, RegisterRequest, TokenResponse, User, UserPatch, UserPublic};
use crate::error::{ApiJson, Error};
use crate::users::UserService;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Handlers take this as an argument and pass `&auth.user` down to the services.
/// Requests without a valid token are rejected with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let users = parts
            .extensions
            .get::<Arc<UserService>>()
            .cloned()
            .ok_or_else(|| {
                Error::Internal("UserService extension is not installed".to_string())
            })?;
        let token = bearer_token(parts).ok_or(Error::Unauthenticated)?.to_string();
        let user = users.resolve_token(&token).await?;
        Ok(AuthUser { user, token })
    }
}

pub async fn register(
    Extension(users): Extension<Arc<UserService>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, Error> {
    let user = users.register(req).await?;
    Ok((StatusCode::CREATED, Json(user.public())))
}

pub async fn login(
    Extension(users): Extension<Arc<UserService>>,
    ApiJson(creds): ApiJson<Credentials>,
) -> Result<Json<TokenResponse>, Error> {
    let token = users.login(creds).await?;
    Ok(Json(token.into()))
}

pub async fn logout(
    Extension(users): Extension<Arc<UserService>>,
    auth: AuthUser,
) -> Result<StatusCode, Error> {
    users.logout(&auth.token).await?;
    Ok(StatusCode::OK)
}

pub async fn me(auth: AuthUser) -> Json<UserPublic> {
    Json(auth.user.public())
}

pub async fn update_me(
    Extension(users): Extension<Arc<UserService>>,
    auth: AuthUser,
    ApiJson(patch): ApiJson<UserPatch>,
) -> Result<Json<UserPublic>, Error> {
    let user = users.update(&auth.user, patch).await?;
    Ok(Json(user.public()))
}

pub async fn delete_me(
    Extension(users): Extension<Arc<UserService>>,
    auth: AuthUser,
) -> Result<StatusCode, Error> {
    users.delete(&auth.user).await?;
    Ok(StatusCode::OK)
}
