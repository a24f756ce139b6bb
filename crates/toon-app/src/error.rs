use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::json;
use toon_store::error::StoreError;
use tracing::error;

pub type Error = anyhow::Error;
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] toon_dal::Error),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unprocessable request: {0}")]
    UnprocessableRequest(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathRejection),
    #[error("Invalid query string: {0}")]
    InvalidQueryString(#[from] QueryRejection),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] JsonRejection),
    #[error("Image processing error: {0}")]
    ImageError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(value: tokio::task::JoinError) -> Self {
        ApiError::InternalError(format!("Background task failed: {value}"))
    }
}

fn dal_status(error: &toon_dal::Error) -> StatusCode {
    use toon_dal::Error::*;
    match error {
        RecordNotFound(_) => StatusCode::NOT_FOUND,
        FailedUpdate { .. } | Conflict(_) => StatusCode::CONFLICT,
        InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InvalidOrderByField(_)
        | MissingVersion
        | InvalidRole(_)
        | InvalidReorder(_)
        | InvalidOperation(_) => StatusCode::BAD_REQUEST,
        DatabaseError(_) | MigrationError(_) | DeleteNotConfirmed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidPath => StatusCode::BAD_REQUEST,
        StoreError::PathConflict => StatusCode::CONFLICT,
        StoreError::IoError(_)
        | StoreError::TaskJoinError(_)
        | StoreError::DeleteNotConfirmed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DatabaseError(e) => dal_status(e),
            ApiError::StoreError(e) => store_status(e),
            ApiError::InvalidRequest(_)
            | ApiError::InvalidQuery(_)
            | ApiError::InvalidPath(_)
            | ApiError::InvalidQueryString(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidJson(e) => e.status(),
            ApiError::UnprocessableRequest(_) | ApiError::ImageError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let e: ApiError = toon_dal::Error::RecordNotFound("Page".into()).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        let e: ApiError = toon_dal::Error::FailedUpdate { id: 1, version: 2 }.into();
        assert_eq!(e.status(), StatusCode::CONFLICT);
        let e: ApiError = toon_dal::Error::InvalidReference("genre 9".into()).into();
        assert_eq!(e.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let e: ApiError = toon_dal::Error::InvalidRole("editor".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        let e: ApiError = StoreError::DeleteNotConfirmed("media/a.png".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
