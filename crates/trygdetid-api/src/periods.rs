//! Handlers for `/trygdetid/{id}/perioder` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/trygdetid/{id}/perioder` | Insert, or replace when the body carries an `id` |
//! | `DELETE` | `/trygdetid/{id}/perioder/{period_id}` | 404 if the period is unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::NaiveDate;
use serde::Deserialize;
use trygdetid_core::{
  grunnlag::GrunnlagSource,
  period::{NewPeriod, PeriodKind, PeriodSource},
  service::{PeriodChange, TrygdetidService},
  store::TrygdetidStore,
};
use uuid::Uuid;

use crate::{error::ApiError, records::RecordView};

#[derive(Debug, Deserialize)]
pub struct PeriodBody {
  pub id:                     Option<Uuid>,
  pub kind:                   PeriodKind,
  pub country:                String,
  pub from:                   NaiveDate,
  pub to:                     Option<NaiveDate>,
  #[serde(default)]
  pub counts_at_period_start: bool,
  #[serde(default)]
  pub counts_at_period_end:   bool,
  #[serde(default)]
  pub is_prorated:            bool,
  pub justification:          Option<String>,
  #[serde(default)]
  pub source:                 PeriodSource,
}

impl From<PeriodBody> for NewPeriod {
  fn from(body: PeriodBody) -> Self {
    NewPeriod {
      id:                     body.id,
      kind:                   body.kind,
      country:                body.country,
      from:                   body.from,
      to:                     body.to,
      counts_at_period_start: body.counts_at_period_start,
      counts_at_period_end:   body.counts_at_period_end,
      is_prorated:            body.is_prorated,
      justification:          body.justification,
      source:                 body.source,
    }
  }
}

/// `POST /trygdetid/{id}/perioder`
pub async fn upsert<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(record_id): Path<Uuid>,
  Json(body): Json<PeriodBody>,
) -> Result<Json<RecordView>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let record = service
    .apply_period_change(record_id, PeriodChange::Upsert(body.into()))
    .await?;
  Ok(Json(record.into()))
}

/// `DELETE /trygdetid/{id}/perioder/{period_id}`
pub async fn remove<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path((record_id, period_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RecordView>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let record = service
    .apply_period_change(record_id, PeriodChange::Remove(period_id))
    .await?;
  Ok(Json(record.into()))
}
