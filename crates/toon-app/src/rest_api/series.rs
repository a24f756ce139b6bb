use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use http::StatusCode;
use toon_dal::{
    chapter::ChapterRepository,
    page::PageRepository,
    series::{CreateSeries, SeriesRepository},
};

use crate::{
    error::ApiResult,
    rest_api::{Page, Paging},
    state::AppState,
    validate::{Garde, GardeParts},
};

crate::repository_from_request!(SeriesRepository);

pub async fn list(
    repository: SeriesRepository,
    State(state): State<AppState>,
    GardeParts(Query(paging)): GardeParts<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let default_page_size = state.config().default_page_size;
    let page_size = paging.page_size(default_page_size);
    let listing_params = paging.into_listing_params(default_page_size)?;
    let batch = repository.list(listing_params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size)?)))
}

pub async fn count(repository: SeriesRepository) -> ApiResult<impl IntoResponse> {
    let count = repository.count().await?;
    Ok((StatusCode::OK, Json(count)))
}

pub async fn get_series(
    Path(id): Path<i64>,
    repository: SeriesRepository,
) -> ApiResult<impl IntoResponse> {
    let series = repository.get(id).await?;
    Ok((StatusCode::OK, Json(series)))
}

pub async fn get_by_slug(
    Path(slug): Path<String>,
    repository: SeriesRepository,
) -> ApiResult<impl IntoResponse> {
    let series = repository.get_by_slug(&slug).await?;
    Ok((StatusCode::OK, Json(series)))
}

pub async fn create(
    repository: SeriesRepository,
    Garde(Json(payload)): Garde<Json<CreateSeries>>,
) -> ApiResult<impl IntoResponse> {
    let series = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(series)))
}

pub async fn update(
    Path(id): Path<i64>,
    repository: SeriesRepository,
    Garde(Json(payload)): Garde<Json<CreateSeries>>,
) -> ApiResult<impl IntoResponse> {
    let series = repository.update(id, payload).await?;
    Ok((StatusCode::OK, Json(series)))
}

pub async fn delete(
    Path(id): Path<i64>,
    repository: SeriesRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

pub async fn list_chapters(
    Path(id): Path<i64>,
    repository: ChapterRepository,
) -> ApiResult<impl IntoResponse> {
    let chapters = repository.list_for_series(id).await?;
    Ok((StatusCode::OK, Json(chapters)))
}

pub async fn list_pages(
    Path(id): Path<i64>,
    repository: PageRepository,
) -> ApiResult<impl IntoResponse> {
    let pages = repository.list_for_series(id).await?;
    Ok((StatusCode::OK, Json(pages)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/count", get(count))
        .route("/slug/{slug}", get(get_by_slug))
        .route("/{id}", get(get_series).put(update).delete(delete))
        .route("/{id}/chapters", get(list_chapters))
        .route("/{id}/pages", get(list_pages))
}
