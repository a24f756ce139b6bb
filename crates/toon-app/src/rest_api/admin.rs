//! Maintenance endpoints, each answers with `{"updated": n}` plus optional details

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use garde::Validate;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use toon_dal::{
    chapter::ChapterRepository,
    page::PageRepository,
    relationship,
    stats::{Stage, StatsPipeline},
};

use crate::{error::ApiResult, publish::publish_all, state::AppState, validate::Garde};

crate::repository_from_request!(StatsPipeline);

#[derive(Debug, Serialize)]
pub struct Updated<T: Serialize> {
    pub updated: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<T>,
}

impl Updated<()> {
    pub fn count(updated: u64) -> Self {
        Updated {
            updated,
            details: None,
        }
    }
}

impl<T: Serialize> Updated<T> {
    pub fn with_details(updated: u64, details: T) -> Self {
        Updated {
            updated,
            details: Some(details),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderRequest {
    #[garde(length(min = 1, max = 10_000))]
    pub ordered_ids: Vec<i64>,
}

async fn stage(pipeline: &StatsPipeline, series_id: i64, stage: Stage) -> ApiResult<Json<Updated<()>>> {
    let report = pipeline.run_stage(series_id, stage).await?;
    Ok(Json(Updated::count(report.updated())))
}

pub async fn recalculate_global_numbers(
    Path(series_id): Path<i64>,
    pipeline: StatsPipeline,
) -> ApiResult<impl IntoResponse> {
    stage(&pipeline, series_id, Stage::Renumber).await
}

pub async fn recalculate_chapter_stats(
    Path(series_id): Path<i64>,
    pipeline: StatsPipeline,
) -> ApiResult<impl IntoResponse> {
    stage(&pipeline, series_id, Stage::ChapterStats).await
}

pub async fn recalculate_series_stats(
    Path(series_id): Path<i64>,
    pipeline: StatsPipeline,
) -> ApiResult<impl IntoResponse> {
    stage(&pipeline, series_id, Stage::SeriesStats).await
}

pub async fn recalculate_navigation(
    Path(series_id): Path<i64>,
    pipeline: StatsPipeline,
) -> ApiResult<impl IntoResponse> {
    stage(&pipeline, series_id, Stage::Navigation).await
}

pub async fn recalculate_all(pipeline: StatsPipeline) -> ApiResult<impl IntoResponse> {
    let reports = pipeline.recalculate_all().await?;
    let updated = reports.iter().map(|r| r.updated()).sum();
    Ok(Json(Updated::with_details(updated, reports)))
}

pub async fn reorder_chapters(
    Path(series_id): Path<i64>,
    repository: ChapterRepository,
    pipeline: StatsPipeline,
    Garde(Json(request)): Garde<Json<ReorderRequest>>,
) -> ApiResult<impl IntoResponse> {
    let updated = repository.reorder(series_id, &request.ordered_ids).await?;
    let report = pipeline.after_mutation(series_id).await;
    Ok(Json(Updated::with_details(updated, report)))
}

pub async fn reorder_pages(
    Path(chapter_id): Path<i64>,
    repository: PageRepository,
    pipeline: StatsPipeline,
    Garde(Json(request)): Garde<Json<ReorderRequest>>,
) -> ApiResult<impl IntoResponse> {
    let reorder = repository.reorder(chapter_id, &request.ordered_ids).await?;
    let report = pipeline.after_mutation(reorder.series_id).await;
    Ok(Json(Updated::with_details(reorder.updated, report)))
}

#[derive(Debug, Serialize)]
pub struct RelationRepair {
    table: &'static str,
    removed: u64,
    renumbered: u64,
}

pub async fn repair_relationships(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let mut tx = state.pool().begin().await.map_err(toon_dal::Error::from)?;
    let reports = relationship::repair_all(&mut tx).await?;
    tx.commit().await.map_err(toon_dal::Error::from)?;
    let details = reports
        .into_iter()
        .map(|(relation, r)| RelationRepair {
            table: relation.table(),
            removed: r.removed,
            renumbered: r.renumbered,
        })
        .collect::<Vec<_>>();
    let updated = details.iter().map(|r| r.removed + r.renumbered).sum();
    Ok(Json(Updated::with_details(updated, details)))
}

pub async fn stats_backlog(pipeline: StatsPipeline) -> ApiResult<impl IntoResponse> {
    let backlog = pipeline.backlog().await?;
    Ok((StatusCode::OK, Json(backlog)))
}

pub async fn repair_stats_backlog(pipeline: StatsPipeline) -> ApiResult<impl IntoResponse> {
    let repair = pipeline.repair_backlog().await?;
    Ok(Json(Updated::with_details(repair.repaired.len() as u64, repair)))
}

pub async fn publish(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = publish_all(state.pool(), state.store()).await?;
    Ok(Json(Updated::with_details(report.manifests, report)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/recalculate-global-numbers/{series_id}",
            post(recalculate_global_numbers),
        )
        .route(
            "/recalculate-chapter-stats/{series_id}",
            post(recalculate_chapter_stats),
        )
        .route(
            "/recalculate-series-stats/{series_id}",
            post(recalculate_series_stats),
        )
        .route(
            "/recalculate-navigation/{series_id}",
            post(recalculate_navigation),
        )
        .route("/recalculate-all", post(recalculate_all))
        .route("/reorder-chapters/{series_id}", post(reorder_chapters))
        .route("/reorder-pages/{chapter_id}", post(reorder_pages))
        .route("/repair-relationships", post(repair_relationships))
        .route("/stats-backlog", get(stats_backlog))
        .route("/repair-stats-backlog", post(repair_stats_backlog))
        .route("/publish", post(publish))
}
