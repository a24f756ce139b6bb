use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use http::StatusCode;
use toon_dal::page::{CreatePage, PageRepository};

use crate::{error::ApiResult, state::AppState, validate::Garde};

crate::repository_from_request!(PageRepository);

pub async fn create(
    repository: PageRepository,
    State(state): State<AppState>,
    Garde(Json(payload)): Garde<Json<CreatePage>>,
) -> ApiResult<impl IntoResponse> {
    let page = repository.create(payload).await?;
    state.pipeline().after_mutation(page.series_id).await;
    let page = repository.get(page.id).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn get_page(
    Path(id): Path<i64>,
    repository: PageRepository,
) -> ApiResult<impl IntoResponse> {
    let page = repository.get(id).await?;
    Ok((StatusCode::OK, Json(page)))
}

pub async fn update(
    Path(id): Path<i64>,
    repository: PageRepository,
    State(state): State<AppState>,
    Garde(Json(payload)): Garde<Json<CreatePage>>,
) -> ApiResult<impl IntoResponse> {
    let page = repository.update(id, payload).await?;
    state.pipeline().after_mutation(page.series_id).await;
    let page = repository.get(page.id).await?;
    Ok((StatusCode::OK, Json(page)))
}

pub async fn delete(
    Path(id): Path<i64>,
    repository: PageRepository,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let series_id = repository.delete(id).await?;
    state.pipeline().after_mutation(series_id).await;
    Ok((StatusCode::NO_CONTENT, ()))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(create))
        .route("/{id}", get(get_page).put(update).delete(delete))
}
