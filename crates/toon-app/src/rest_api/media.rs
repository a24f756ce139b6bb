use axum::{
    Json,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use garde::Validate;
use http::{StatusCode, header};
use serde::Deserialize;
use toon_dal::media::MediaRepository;
use toon_store::{Store as _, ValidPath};

use crate::{
    error::{ApiError, ApiResult},
    media::{Upload, ingest, remove},
    rest_api::{Page, Paging},
    state::AppState,
    validate::GardeParts,
};

crate::repository_from_request!(MediaRepository);

#[derive(Debug, Deserialize, Validate)]
pub struct UploadParams {
    #[garde(length(min = 1, max = 255))]
    name: String,
    #[garde(length(max = 2000))]
    alt_text: Option<String>,
    #[garde(skip)]
    created_by: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DataParams {
    size: Option<String>,
}

/// Raw image bytes in body, file name in query
pub async fn upload(
    repository: MediaRepository,
    State(state): State<AppState>,
    GardeParts(Query(params)): GardeParts<Query<UploadParams>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let upload = Upload {
        original_name: params.name,
        alt_text: params.alt_text,
        created_by: params.created_by,
        data: body,
    };
    let ingested = ingest(&repository, state.store(), upload).await?;
    let status = if ingested.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let location = state
        .build_url(&format!("api/media/{}", ingested.media.id))
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok((
        status,
        [(header::LOCATION, location.to_string())],
        Json(ingested.media),
    ))
}

pub async fn list(
    repository: MediaRepository,
    State(state): State<AppState>,
    GardeParts(Query(paging)): GardeParts<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let default_page_size = state.config().default_page_size;
    let page_size = paging.page_size(default_page_size);
    let listing_params = paging.into_listing_params(default_page_size)?;
    let batch = repository.list(listing_params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size)?)))
}

pub async fn get_media(
    Path(id): Path<i64>,
    repository: MediaRepository,
) -> ApiResult<impl IntoResponse> {
    let media = repository.get(id).await?;
    Ok((StatusCode::OK, Json(media)))
}

/// Original image, or one of its generated sizes
pub async fn data(
    Path(id): Path<i64>,
    repository: MediaRepository,
    State(state): State<AppState>,
    Query(params): Query<DataParams>,
) -> ApiResult<impl IntoResponse> {
    let media = repository.get(id).await?;
    let (key, mime_type) = match params.size.as_deref() {
        None => (media.object_key.clone(), media.mime_type.clone()),
        Some(size) => {
            let variant = media
                .variant(size)
                .ok_or_else(|| ApiError::InvalidQuery(format!("Size {size} not available")))?;
            (variant.object_key.clone(), variant.mime_type.clone())
        }
    };
    let path = ValidPath::new(key)?;
    let size = state.store().size(&path).await?;
    let stream = state.store().load_data(&path).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_LENGTH, size.to_string()),
        ],
        Body::from_stream(stream),
    ))
}

pub async fn delete(
    Path(id): Path<i64>,
    repository: MediaRepository,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    remove(&repository, state.store(), id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

pub fn router(limit_mb: usize) -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(upload))
        .route("/{id}", get(get_media).delete(delete))
        .route("/{id}/data", get(data))
        .layer(DefaultBodyLimit::max(1024 * 1024 * limit_mb))
}
