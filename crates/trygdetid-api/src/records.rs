//! Handlers for `/behandlinger/{case_id}/trygdetid` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/behandlinger/{case_id}/trygdetid` | All records of the case |
//! | `POST`   | `/behandlinger/{case_id}/trygdetid` | Body: `{"ident":"..."}` |
//! | `DELETE` | `/behandlinger/{case_id}/trygdetid` | Removes every record of the case |
//! | `GET`    | `/behandlinger/{case_id}/trygdetid/{ident}` | Current figure, recomputed if stale |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use trygdetid_core::{
  grunnlag::GrunnlagSource,
  normalize::Conflict,
  record::{InsuranceTimeRecord, RecordState},
  service::{Assessment, TrygdetidService},
  store::TrygdetidStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// A record together with the values derived from it.
#[derive(Debug, Serialize)]
pub struct RecordView {
  #[serde(flatten)]
  pub record:            InsuranceTimeRecord,
  pub state:             RecordState,
  pub effective_total:   Option<u32>,
  pub below_four_fifths: bool,
  pub coverage_gaps:     Vec<Conflict>,
}

impl From<InsuranceTimeRecord> for RecordView {
  fn from(record: InsuranceTimeRecord) -> Self {
    Self {
      state: record.state(),
      effective_total: record.effective_total(),
      below_four_fifths: record
        .computed_result
        .as_ref()
        .is_some_and(|r| r.below_four_fifths()),
      coverage_gaps: record.coverage_gaps(),
      record,
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /behandlinger/{case_id}/trygdetid`
pub async fn list<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(case_id): Path<Uuid>,
) -> Result<Json<Vec<RecordView>>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let records = service.list_for_case(case_id).await?;
  Ok(Json(records.into_iter().map(RecordView::from).collect()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub ident: String,
}

/// `POST /behandlinger/{case_id}/trygdetid`
pub async fn create<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(case_id): Path<Uuid>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  if body.ident.trim().is_empty() {
    return Err(ApiError::BadRequest("ident must not be empty".into()));
  }
  let record = service.create(case_id, &body.ident).await?;
  Ok((StatusCode::CREATED, Json(RecordView::from(record))))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /behandlinger/{case_id}/trygdetid`
pub async fn delete_case<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(case_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let removed = service.delete_case(case_id).await?;
  Ok(Json(json!({ "removed": removed })))
}

// ─── Compute for person ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
  Assessed,
  NotYetAssessed,
}

#[derive(Debug, Serialize)]
pub struct AssessmentView {
  pub status:    AssessmentStatus,
  pub trygdetid: Option<RecordView>,
}

impl From<Assessment> for AssessmentView {
  fn from(assessment: Assessment) -> Self {
    match assessment {
      Assessment::Assessed(record) => Self {
        status:    AssessmentStatus::Assessed,
        trygdetid: Some(record.into()),
      },
      Assessment::NotYetAssessed(record) => Self {
        status:    AssessmentStatus::NotYetAssessed,
        trygdetid: record.map(RecordView::from),
      },
    }
  }
}

/// `GET /behandlinger/{case_id}/trygdetid/{ident}`
pub async fn for_person<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path((case_id, ident)): Path<(Uuid, String)>,
) -> Result<Json<AssessmentView>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let assessment = service.compute_for_person(case_id, &ident).await?;
  Ok(Json(assessment.into()))
}
