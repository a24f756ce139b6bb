use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use http::StatusCode;
use toon_dal::{
    chapter::{ChapterRepository, CreateChapter, UpdateChapter},
    page::PageRepository,
};

use crate::{error::ApiResult, state::AppState, validate::Garde};

crate::repository_from_request!(ChapterRepository);

pub async fn create(
    repository: ChapterRepository,
    State(state): State<AppState>,
    Garde(Json(payload)): Garde<Json<CreateChapter>>,
) -> ApiResult<impl IntoResponse> {
    let chapter = repository.create(payload).await?;
    state.pipeline().after_mutation(chapter.series_id).await;
    let chapter = repository.get(chapter.id).await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

pub async fn get_chapter(
    Path(id): Path<i64>,
    repository: ChapterRepository,
) -> ApiResult<impl IntoResponse> {
    let chapter = repository.get(id).await?;
    Ok((StatusCode::OK, Json(chapter)))
}

pub async fn update(
    Path(id): Path<i64>,
    repository: ChapterRepository,
    State(state): State<AppState>,
    Garde(Json(payload)): Garde<Json<UpdateChapter>>,
) -> ApiResult<impl IntoResponse> {
    let chapter = repository.update(id, payload).await?;
    state.pipeline().after_mutation(chapter.series_id).await;
    let chapter = repository.get(chapter.id).await?;
    Ok((StatusCode::OK, Json(chapter)))
}

pub async fn delete(
    Path(id): Path<i64>,
    repository: ChapterRepository,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let deletion = repository.delete(id).await?;
    state.pipeline().after_mutation(deletion.series_id).await;
    Ok((StatusCode::OK, Json(deletion)))
}

pub async fn list_pages(
    Path(id): Path<i64>,
    repository: PageRepository,
) -> ApiResult<impl IntoResponse> {
    let pages = repository.list_for_chapter(id).await?;
    Ok((StatusCode::OK, Json(pages)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(create))
        .route("/{id}", get(get_chapter).put(update).delete(delete))
        .route("/{id}/pages", get(list_pages))
}
