use axum::{
    Json,
    extract::{Path, Query},
    response::IntoResponse,
    routing::get,
};
use http::StatusCode;
use serde::Deserialize;
use toon_dal::user::{CreateUser, UserRepository};

use crate::{error::ApiResult, state::AppState, validate::Garde};

crate::repository_from_request!(UserRepository);

const DEFAULT_USERS_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    limit: Option<usize>,
}

pub async fn create(
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list(
    repository: UserRepository,
    Query(query): Query<UsersQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_USERS_LIMIT)
        .min(toon_dal::MAX_LIMIT);
    let users = repository.list(limit).await?;
    Ok((StatusCode::OK, Json(users)))
}

pub async fn get_user(
    Path(id): Path<i64>,
    repository: UserRepository,
) -> ApiResult<impl IntoResponse> {
    let user = repository.get(id).await?;
    Ok((StatusCode::OK, Json(user)))
}

pub async fn delete(
    Path(id): Path<i64>,
    repository: UserRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_user).delete(delete))
}
