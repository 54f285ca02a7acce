//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use trygdetid_core::{Error, normalize::Conflict, service::ServiceError};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The period set would become inconsistent.
  #[error("{message}")]
  Conflicts { message: String, conflicts: Vec<Conflict> },

  #[error("already exists: {0}")]
  Exists(String),

  /// The request is well-formed but required data is missing.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("fact source error: {0}")]
  FactSource(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ServiceError> for ApiError {
  fn from(err: ServiceError) -> Self {
    match err {
      ServiceError::Store(e) => ApiError::Store(e),
      ServiceError::Facts(e) => ApiError::FactSource(e),
      ServiceError::Domain(e) => match e {
        Error::RecordNotFound(_) | Error::PeriodNotFound(_) => {
          ApiError::NotFound(e.to_string())
        }
        Error::Normalization(n) => ApiError::Conflicts {
          message:   n.to_string(),
          conflicts: n.conflicts,
        },
        Error::RecordExists { .. } => ApiError::Exists(e.to_string()),
        Error::MissingPriorData { .. }
        | Error::MissingFact(_)
        | Error::FactsUnavailable { .. } => ApiError::Unprocessable(e.to_string()),
        Error::InvertedInterval { .. }
        | Error::InvalidCountryCode(_)
        | Error::OverrideOutOfRange { .. } => ApiError::BadRequest(e.to_string()),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Conflicts { message, conflicts } => (
        StatusCode::CONFLICT,
        json!({ "error": message, "conflicts": conflicts }),
      ),
      ApiError::Exists(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::Unprocessable(m) => {
        (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": m }))
      }
      ApiError::FactSource(e) => {
        tracing::error!(error = %e, "fact source failed");
        (StatusCode::BAD_GATEWAY, json!({ "error": e.to_string() }))
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failed");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
      }
    };
    (status, Json(body)).into_response()
  }
}
