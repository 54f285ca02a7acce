//! Encoding and decoding between trygdetid domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings and calendar dates are ISO 8601
//! (`YYYY-MM-DD`). Derived values and nested structures (computed results,
//! overrides, fact snapshots, period sources) are stored as compact JSON.
//! UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use trygdetid_core::{
  period::{CountryCode, DateInterval, InsurancePeriod, PeriodKind},
  record::InsuranceTimeRecord,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_kind(s: &str) -> Result<PeriodKind> {
  s.parse().map_err(|_| Error::UnknownValue {
    what:  "period kind",
    value: s.to_owned(),
  })
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

fn decode_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of one `trygdetid` row.
pub struct RecordRow {
  pub record_id:           String,
  pub case_id:             String,
  pub ident:               String,
  pub created_at:          String,
  pub occupational_injury: bool,
  pub nordic_convention:   bool,
  pub point_year_override: Option<u32>,
  pub result_override:     Option<String>,
  pub computed_result:     Option<String>,
  pub facts:               String,
}

/// Column values of one `trygdetid_period` row, minus the owning record id
/// and position.
pub struct PeriodRow {
  pub period_id:              String,
  pub kind:                   String,
  pub country:                String,
  pub from_date:              String,
  pub to_date:                Option<String>,
  pub counts_at_period_start: bool,
  pub counts_at_period_end:   bool,
  pub is_prorated:            bool,
  pub computed_duration:      Option<String>,
  pub justification:          Option<String>,
  pub source:                 String,
}

impl RecordRow {
  pub fn encode(record: &InsuranceTimeRecord) -> Result<(Self, Vec<PeriodRow>)> {
    let row = Self {
      record_id:           encode_uuid(record.id),
      case_id:             encode_uuid(record.case_id),
      ident:               record.ident.clone(),
      created_at:          encode_dt(record.created_at),
      occupational_injury: record.occupational_injury,
      nordic_convention:   record.nordic_convention,
      point_year_override: record.point_year_override,
      result_override:     record.result_override.as_ref().map(encode_json).transpose()?,
      computed_result:     record.computed_result.as_ref().map(encode_json).transpose()?,
      facts:               encode_json(&record.facts)?,
    };
    let periods = record
      .periods
      .iter()
      .map(PeriodRow::encode)
      .collect::<Result<Vec<_>>>()?;
    Ok((row, periods))
  }

  pub fn decode(self, periods: Vec<PeriodRow>) -> Result<InsuranceTimeRecord> {
    Ok(InsuranceTimeRecord {
      id:                  decode_uuid(&self.record_id)?,
      case_id:             decode_uuid(&self.case_id)?,
      ident:               self.ident,
      created_at:          decode_dt(&self.created_at)?,
      periods:             periods
        .into_iter()
        .map(PeriodRow::decode)
        .collect::<Result<Vec<_>>>()?,
      computed_result:     self.computed_result.as_deref().map(decode_json).transpose()?,
      point_year_override: self.point_year_override,
      occupational_injury: self.occupational_injury,
      nordic_convention:   self.nordic_convention,
      result_override:     self.result_override.as_deref().map(decode_json).transpose()?,
      facts:               decode_json(&self.facts)?,
    })
  }
}

impl PeriodRow {
  pub fn encode(period: &InsurancePeriod) -> Result<Self> {
    Ok(Self {
      period_id:              encode_uuid(period.id),
      kind:                   period.kind.to_string(),
      country:                period.country.as_str().to_owned(),
      from_date:              encode_date(period.interval.from()),
      to_date:                period.interval.to().map(encode_date),
      counts_at_period_start: period.counts_at_period_start,
      counts_at_period_end:   period.counts_at_period_end,
      is_prorated:            period.is_prorated,
      computed_duration:      period.computed_duration.as_ref().map(encode_json).transpose()?,
      justification:          period.justification.clone(),
      source:                 encode_json(&period.source)?,
    })
  }

  pub fn decode(self) -> Result<InsurancePeriod> {
    let to = self.to_date.as_deref().map(decode_date).transpose()?;
    Ok(InsurancePeriod {
      id:                     decode_uuid(&self.period_id)?,
      kind:                   decode_kind(&self.kind)?,
      country:                CountryCode::parse(&self.country)?,
      interval:               DateInterval::new(decode_date(&self.from_date)?, to)?,
      counts_at_period_start: self.counts_at_period_start,
      counts_at_period_end:   self.counts_at_period_end,
      is_prorated:            self.is_prorated,
      computed_duration:      self.computed_duration.as_deref().map(decode_json).transpose()?,
      justification:          self.justification,
      source:                 decode_json(&self.source)?,
    })
  }
}
