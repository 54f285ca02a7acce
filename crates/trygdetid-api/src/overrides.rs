//! Handlers for manual inputs on a record.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/trygdetid/{id}/overstyr` | A result override |
//! | `POST` | `/trygdetid/{id}/yrkesskade` | `{"enabled":true}` |
//! | `POST` | `/trygdetid/{id}/poengaar` | `{"years":12}`, or `{"years":null}` to clear |
//! | `POST` | `/trygdetid/{id}/nordisk-konvensjon` | `{"enabled":true}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use trygdetid_core::{
  grunnlag::GrunnlagSource,
  record::ResultOverride,
  service::TrygdetidService,
  store::TrygdetidStore,
};
use uuid::Uuid;

use crate::{error::ApiError, records::RecordView};

#[derive(Debug, Deserialize)]
pub struct FlagBody {
  pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PointYearBody {
  pub years: Option<u32>,
}

/// `POST /trygdetid/{id}/overstyr`
pub async fn total<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(record_id): Path<Uuid>,
  Json(body): Json<ResultOverride>,
) -> Result<Json<RecordView>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  Ok(Json(service.override_total(record_id, body).await?.into()))
}

/// `POST /trygdetid/{id}/yrkesskade`
pub async fn occupational_injury<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(record_id): Path<Uuid>,
  Json(body): Json<FlagBody>,
) -> Result<Json<RecordView>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let record = service
    .override_occupational_injury(record_id, body.enabled)
    .await?;
  Ok(Json(record.into()))
}

/// `POST /trygdetid/{id}/poengaar`
pub async fn point_years<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(record_id): Path<Uuid>,
  Json(body): Json<PointYearBody>,
) -> Result<Json<RecordView>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let record = service.set_point_year_override(record_id, body.years).await?;
  Ok(Json(record.into()))
}

/// `POST /trygdetid/{id}/nordisk-konvensjon`
pub async fn nordic_convention<S, G>(
  State(service): State<Arc<TrygdetidService<S, G>>>,
  Path(record_id): Path<Uuid>,
  Json(body): Json<FlagBody>,
) -> Result<Json<RecordView>, ApiError>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  let record = service.set_nordic_convention(record_id, body.enabled).await?;
  Ok(Json(record.into()))
}
