use std::fmt::{Display, Formatter};
use std::ops::Deref;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::response::{IntoResponse, Response};
use garde::{Report, Validate};
use http::StatusCode;
use http::request::Parts;
use serde_json::json;

use crate::state::AppState;

/// Extractor running garde validation on the payload of the inner extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct Garde<E>(pub E);

impl<E> Deref for Garde<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E> Garde<E> {
    pub fn into_inner(self) -> E {
        self.0
    }
}

#[derive(Debug)]
pub enum GardeRejection<E> {
    Invalid(Report),
    Inner(E),
}

impl<E: Display> Display for GardeRejection<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GardeRejection::Invalid(report) => write!(f, "{report}"),
            GardeRejection::Inner(error) => write!(f, "{error}"),
        }
    }
}

impl<E> From<Report> for GardeRejection<E> {
    fn from(value: Report) -> Self {
        Self::Invalid(value)
    }
}

impl<E: IntoResponse> IntoResponse for GardeRejection<E> {
    fn into_response(self) -> Response {
        match self {
            GardeRejection::Invalid(report) => {
                let details = report
                    .iter()
                    .map(|(path, error)| format!("{path}: {error}"))
                    .collect::<Vec<_>>();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"error": "Validation failed", "details": details})),
                )
                    .into_response()
            }
            GardeRejection::Inner(e) => e.into_response(),
        }
    }
}

impl<Extractor, T> FromRequest<AppState> for Garde<Extractor>
where
    T: Validate<Context = ()>,
    Extractor: Deref<Target = T> + FromRequest<AppState>,
{
    type Rejection = GardeRejection<<Extractor as FromRequest<AppState>>::Rejection>;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let inner = Extractor::from_request(req, state)
            .await
            .map_err(GardeRejection::Inner)?;
        inner.deref().validate()?;
        Ok(Garde(inner))
    }
}

/// For query strings, which are extracted from request parts only
pub struct GardeParts<E>(pub E);

impl<Extractor, T> FromRequestParts<AppState> for GardeParts<Extractor>
where
    T: Validate<Context = ()>,
    Extractor: Deref<Target = T> + FromRequestParts<AppState>,
{
    type Rejection = GardeRejection<<Extractor as FromRequestParts<AppState>>::Rejection>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let inner = Extractor::from_request_parts(parts, state)
            .await
            .map_err(GardeRejection::Inner)?;
        inner.deref().validate()?;
        Ok(GardeParts(inner))
    }
}
