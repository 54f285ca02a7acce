//! Error types for `trygdetid-core`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::normalize::NormalizationError;

#[derive(Debug, Error)]
pub enum Error {
  // ── Structural ────────────────────────────────────────────────────────

  #[error("period ends ({to}) before it starts ({from})")]
  InvertedInterval { from: NaiveDate, to: NaiveDate },

  #[error("invalid country code: {0:?}")]
  InvalidCountryCode(String),

  #[error(transparent)]
  Normalization(#[from] NormalizationError),

  // ── Preconditions ─────────────────────────────────────────────────────

  #[error("trygdetid already exists for person {ident} in case {case_id}")]
  RecordExists { case_id: Uuid, ident: String },

  #[error("trygdetid not found: {0}")]
  RecordNotFound(Uuid),

  #[error("period not found: {0}")]
  PeriodNotFound(Uuid),

  #[error(
    "no trygdetid basis for person {ident} on case {prior_case_id}; automatic \
     regulering requires manual handling"
  )]
  MissingPriorData { prior_case_id: Uuid, ident: String },

  #[error("missing fact required for future trygdetid: {0}")]
  MissingFact(&'static str),

  #[error("no facts available for person {ident} in case {case_id}")]
  FactsUnavailable { case_id: Uuid, ident: String },

  #[error("{what} of {value} exceeds the statutory maximum of {max} years")]
  OverrideOutOfRange { what: &'static str, value: u32, max: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
