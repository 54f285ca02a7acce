//! The insurance-time record, one per person relevant to a case.
//!
//! A record is a value. Every operation borrows the current record and returns
//! a new one; recomputation is an explicit step composed after the change
//! ([`InsuranceTimeRecord::recomputed`]), never a side effect of a setter. A
//! failed operation leaves the caller holding the unchanged original.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  calculation::{
    CalculationInput, CalculationResult, Fraction, MAX_INSURANCE_YEARS,
    compute_total,
  },
  grunnlag::PersonFacts,
  normalize::{Conflict, arrange, coverage_gaps},
  period::{InsurancePeriod, OpenEnds, compute_period_durations},
};

// ─── Manual result override ──────────────────────────────────────────────────

/// A caseworker-supplied final figure that supersedes the computed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOverride {
  pub total_norway:      u32,
  pub total_theoretical: Option<u32>,
  pub prorata_fraction:  Option<Fraction>,
  pub justification:     Option<String>,
}

impl ResultOverride {
  pub fn new(total_norway: u32) -> Self {
    Self {
      total_norway,
      total_theoretical: None,
      prorata_fraction: None,
      justification: None,
    }
  }

  fn validate(&self) -> Result<()> {
    let totals = [Some(self.total_norway), self.total_theoretical];
    match totals.into_iter().flatten().find(|t| *t > MAX_INSURANCE_YEARS) {
      Some(value) => Err(Error::OverrideOutOfRange {
        what: "result override",
        value,
        max: MAX_INSURANCE_YEARS,
      }),
      None => Ok(()),
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodDrivenMode {
  Standard,
  OccupationalInjuryMax,
}

/// Where a record sits in its lifecycle; derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordState {
  Unassessed,
  PeriodDriven { mode: PeriodDrivenMode },
  Overridden,
}

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceTimeRecord {
  pub id:                  Uuid,
  pub case_id:             Uuid,
  pub ident:               String,
  pub created_at:          DateTime<Utc>,
  /// Sorted by start date; never overlapping.
  pub periods:             Vec<InsurancePeriod>,
  /// Output of the last recomputation; `None` if never assessed or
  /// overridden.
  pub computed_result:     Option<CalculationResult>,
  pub point_year_override: Option<u32>,
  /// Set from an external eligibility decision.
  pub occupational_injury: bool,
  pub nordic_convention:   bool,
  pub result_override:     Option<ResultOverride>,
  /// The fact snapshot the current result was computed from.
  pub facts:               PersonFacts,
}

impl InsuranceTimeRecord {
  /// A fresh, unassessed record.
  pub fn new(case_id: Uuid, facts: PersonFacts) -> Self {
    Self {
      id: Uuid::new_v4(),
      case_id,
      ident: facts.ident.clone(),
      created_at: Utc::now(),
      periods: Vec::new(),
      computed_result: None,
      point_year_override: None,
      occupational_injury: false,
      nordic_convention: false,
      result_override: None,
      facts,
    }
  }

  // ── Derived views ─────────────────────────────────────────────────────

  pub fn state(&self) -> RecordState {
    if self.result_override.is_some() {
      RecordState::Overridden
    } else if self.computed_result.is_none() {
      RecordState::Unassessed
    } else if self.occupational_injury {
      RecordState::PeriodDriven { mode: PeriodDrivenMode::OccupationalInjuryMax }
    } else {
      RecordState::PeriodDriven { mode: PeriodDrivenMode::Standard }
    }
  }

  /// The figure downstream code should use: the manual override when set,
  /// otherwise the computed national total.
  pub fn effective_total(&self) -> Option<u32> {
    match &self.result_override {
      Some(o) => Some(o.total_norway),
      None => self.computed_result.as_ref().map(|r| r.total_norway),
    }
  }

  /// True if anything would let a revision reproduce this record's result.
  pub fn has_basis(&self) -> bool {
    !self.periods.is_empty()
      || self.result_override.is_some()
      || self.point_year_override.is_some()
      || self.occupational_injury
  }

  /// Gaps between actual periods, for presentation.
  pub fn coverage_gaps(&self) -> Vec<Conflict> { coverage_gaps(&self.periods) }

  pub fn period(&self, period_id: Uuid) -> Option<&InsurancePeriod> {
    self.periods.iter().find(|p| p.id == period_id)
  }

  // ── Recomputation ─────────────────────────────────────────────────────

  /// Re-derive every period's duration and the calculation result from the
  /// current periods and scalar facts.
  ///
  /// An overridden record has no period detail to compute from; its
  /// computed result stays empty.
  pub fn recomputed(mut self, as_of: NaiveDate) -> Result<Self> {
    if self.result_override.is_some() {
      self.computed_result = None;
      return Ok(self);
    }

    let ends = OpenEnds::resolve(self.facts.birthdate, self.facts.deathdate, as_of);
    let durations = compute_period_durations(&self.periods, ends);
    for (period, computed) in self.periods.iter_mut().zip(durations) {
      period.computed_duration = Some(computed);
    }

    self.computed_result = compute_total(&CalculationInput {
      periods:             &self.periods,
      birthdate:           self.facts.birthdate,
      deathdate:           self.facts.deathdate,
      point_year_override: self.point_year_override,
      occupational_injury: self.occupational_injury,
      nordic_convention:   self.nordic_convention,
      as_of,
    })?;
    Ok(self)
  }

  // ── Operations ────────────────────────────────────────────────────────

  /// Insert `period`, or replace the stored period with the same id.
  ///
  /// The resulting set must not overlap. Clears any manual result override.
  pub fn upsert_period(
    &self,
    period: InsurancePeriod,
    as_of: NaiveDate,
  ) -> Result<Self> {
    let mut periods: Vec<InsurancePeriod> = self
      .periods
      .iter()
      .filter(|p| p.id != period.id)
      .cloned()
      .collect();
    periods.push(period);
    let periods = arrange(periods)?;

    Self {
      periods,
      computed_result: None,
      result_override: None,
      ..self.clone()
    }
    .recomputed(as_of)
  }

  /// Remove a period. Coverage may shrink; that is allowed.
  pub fn remove_period(&self, period_id: Uuid, as_of: NaiveDate) -> Result<Self> {
    if self.period(period_id).is_none() {
      return Err(Error::PeriodNotFound(period_id));
    }
    let periods = arrange(
      self
        .periods
        .iter()
        .filter(|p| p.id != period_id)
        .cloned()
        .collect(),
    )?;

    Self { periods, computed_result: None, ..self.clone() }.recomputed(as_of)
  }

  /// Replace the computed result with a manual figure. Period detail is
  /// discarded; upserting a period later clears the override again.
  pub fn override_result(&self, value: ResultOverride) -> Result<Self> {
    value.validate()?;
    Ok(Self {
      periods: Vec::new(),
      computed_result: None,
      result_override: Some(value),
      ..self.clone()
    })
  }

  pub fn set_occupational_injury(&self, flag: bool, as_of: NaiveDate) -> Result<Self> {
    Self { occupational_injury: flag, ..self.clone() }.recomputed(as_of)
  }

  /// Set or clear (`None`) the manual point-year count.
  pub fn set_point_year_override(
    &self,
    years: Option<u32>,
    as_of: NaiveDate,
  ) -> Result<Self> {
    if let Some(value) = years
      && value > MAX_INSURANCE_YEARS
    {
      return Err(Error::OverrideOutOfRange {
        what: "point-year override",
        value,
        max: MAX_INSURANCE_YEARS,
      });
    }
    Self { point_year_override: years, ..self.clone() }.recomputed(as_of)
  }

  pub fn set_nordic_convention(&self, flag: bool, as_of: NaiveDate) -> Result<Self> {
    Self { nordic_convention: flag, ..self.clone() }.recomputed(as_of)
  }

  /// Adopt a newer fact snapshot and recompute.
  pub fn with_facts(&self, facts: PersonFacts, as_of: NaiveDate) -> Result<Self> {
    Self { facts, ..self.clone() }.recomputed(as_of)
  }
}
