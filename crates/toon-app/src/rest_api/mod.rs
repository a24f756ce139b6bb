pub mod admin;
pub mod chapter;
pub mod genre;
pub mod media;
pub mod page;
mod paging;
pub mod series;
pub mod tag;
pub mod user;

pub use paging::{Page, Paging};

use axum::Router;

use crate::state::AppState;

/// CRUD handlers for simple value entities (name + slug)
#[macro_export]
macro_rules! value_api {
    ($entity:ty) => {
        type EntityRepository = paste::paste! {[<$entity Repository>]};
        $crate::repository_from_request!(EntityRepository);
        pub mod crud_api {
            use super::*;
            use $crate::error::ApiResult;
            use $crate::rest_api::{Page, Paging};
            use $crate::state::AppState;
            use $crate::validate::{Garde, GardeParts};
            use axum::{
                Json,
                extract::{Path, Query, State},
                response::IntoResponse,
            };
            use http::StatusCode;

            type CreateEntity = paste::paste! {[<Create $entity>]};

            pub async fn list(
                repository: EntityRepository,
                State(state): State<AppState>,
                GardeParts(Query(paging)): GardeParts<Query<Paging>>,
            ) -> ApiResult<impl IntoResponse> {
                let default_page_size = state.config().default_page_size;
                let page_size = paging.page_size(default_page_size);
                let listing_params = paging.into_listing_params(default_page_size)?;
                let batch = repository.list(listing_params).await?;
                Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size)?)))
            }

            pub async fn list_all(repository: EntityRepository) -> ApiResult<impl IntoResponse> {
                let records = repository.list_all().await?;
                Ok((StatusCode::OK, Json(records)))
            }

            pub async fn count(repository: EntityRepository) -> ApiResult<impl IntoResponse> {
                let count = repository.count().await?;
                Ok((StatusCode::OK, Json(count)))
            }

            pub async fn get(
                Path(id): Path<i64>,
                repository: EntityRepository,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.get(id).await?;
                Ok((StatusCode::OK, Json(record)))
            }

            pub async fn create(
                repository: EntityRepository,
                Garde(Json(payload)): Garde<Json<CreateEntity>>,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.create(payload).await?;
                Ok((StatusCode::CREATED, Json(record)))
            }

            pub async fn update(
                Path(id): Path<i64>,
                repository: EntityRepository,
                Garde(Json(payload)): Garde<Json<CreateEntity>>,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.update(id, payload).await?;
                Ok((StatusCode::OK, Json(record)))
            }

            pub async fn delete(
                Path(id): Path<i64>,
                repository: EntityRepository,
            ) -> ApiResult<impl IntoResponse> {
                repository.delete(id).await?;
                Ok((StatusCode::NO_CONTENT, ()))
            }
        }

        pub fn router() -> axum::Router<$crate::state::AppState> {
            use axum::routing::get;
            axum::Router::new()
                .route("/", get(crud_api::list).post(crud_api::create))
                .route("/all", get(crud_api::list_all))
                .route("/count", get(crud_api::count))
                .route(
                    "/{id}",
                    get(crud_api::get)
                        .put(crud_api::update)
                        .delete(crud_api::delete),
                )
        }
    };
}

pub fn api_router(upload_limit_mb: usize) -> Router<AppState> {
    Router::new()
        .nest("/series", series::router())
        .nest("/chapter", chapter::router())
        .nest("/page", page::router())
        .nest("/genre", genre::router())
        .nest("/tag", tag::router())
        .nest("/user", user::router())
        .nest("/media", media::router(upload_limit_mb))
        .nest("/admin", admin::router())
}
