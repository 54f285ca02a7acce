//! `POST /behandlinger/{case_id}/trygdetid/kopier`: carry a person's record
//! over from the prior revision.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use trygdetid_core::{
  grunnlag::GrunnlagSource,
  revision::{ProcessType, RevisionCause, RevisionContext},
  service::TrygdetidService,
  store::TrygdetidStore,
};
use uuid::Uuid;

use crate::{error::ApiError, records::RecordView};

#[derive(Debug, Deserialize)]
pub struct CopyBody {
  pub prior_case_id: Uuid,
  pub ident:         String,
  pub cause:         RevisionCause,
  pub process:       ProcessType,
}

pub async fn copy<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(case_id): Path<Uuid>,
  Json(body): Json<CopyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  if body.prior_case_id == case_id {
    return Err(ApiError::BadRequest(
      "prior case must differ from the new case".into(),
    ));
  }
  let context = RevisionContext { cause: body.cause, process: body.process };
  let record = service
    .copy_from_prior_revision(case_id, body.prior_case_id, &body.ident, context)
    .await?;
  Ok((StatusCode::CREATED, Json(RecordView::from(record))))
}
