//! The insurance-time calculation engine.
//!
//! [`compute_total`] is a pure function of its [`CalculationInput`]. The
//! regime is selected first ([`Regime::select`]) and then dispatched on with
//! an exhaustive match, so precedence lives in one place:
//!
//! 1. occupational injury → statutory maximum, periods ignored;
//! 2. manual point-year override → the override is the national total;
//! 3. periods present → totals derived from the periods;
//! 4. otherwise → not yet assessed (`None`).

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  Error, Result,
  period::{
    InsurancePeriod, OpenEnds, PeriodDuration, RuleTrace, compute_period_durations,
  },
};

/// Statutory ceiling on credited insurance time, in years.
pub const MAX_INSURANCE_YEARS: u32 = 40;

/// Future insurance time runs until the end of the year the person turns this
/// old.
pub const UPPER_AGE_BOUNDARY: i32 = 66;

/// 31 December of the year the person reaches [`UPPER_AGE_BOUNDARY`].
pub fn upper_age_boundary(birthdate: NaiveDate) -> NaiveDate {
  NaiveDate::from_ymd_opt(birthdate.year() + UPPER_AGE_BOUNDARY, 12, 31)
    .unwrap_or(NaiveDate::MAX)
}

/// The earning period ("opptjeningstid") starts on this birthday.
pub const EARNING_START_AGE: u32 = 16;

// ─── Input ───────────────────────────────────────────────────────────────────

/// Everything the engine needs; nothing else is consulted.
#[derive(Debug, Clone, Copy)]
pub struct CalculationInput<'a> {
  pub periods:             &'a [InsurancePeriod],
  pub birthdate:           Option<NaiveDate>,
  pub deathdate:           Option<NaiveDate>,
  pub point_year_override: Option<u32>,
  pub occupational_injury: bool,
  pub nordic_convention:   bool,
  /// Resolves open-ended actual periods when no deathdate is known.
  pub as_of:               NaiveDate,
}

// ─── Regime ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regime {
  OccupationalInjury,
  ManualPointYears { years: u32 },
  PeriodDerived,
  Unassessed,
}

impl Regime {
  pub fn select(input: &CalculationInput<'_>) -> Self {
    if input.occupational_injury {
      Self::OccupationalInjury
    } else if let Some(years) = input.point_year_override {
      Self::ManualPointYears { years }
    } else if !input.periods.is_empty() {
      Self::PeriodDerived
    } else {
      Self::Unassessed
    }
  }
}

// ─── Result ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualInsuranceTime {
  pub duration: PeriodDuration,
  pub months:   u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureInsuranceTime {
  /// Accumulated duration of the future periods, before capping.
  pub duration:              PeriodDuration,
  /// Credited months: `duration` capped at `window_months`.
  pub months:                u32,
  /// Months from the deathdate to the end of the upper-age year.
  pub window_months:         u32,
  /// Months from the 16th birthday to the deathdate.
  pub earning_period_months: u32,
  /// Actual time is below four-fifths of the earning period. Reported, not
  /// applied.
  pub below_four_fifths:     bool,
}

/// One full figure: the Norway-only figure or the theoretical (pre-proration)
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceTimeFigure {
  pub actual:      ActualInsuranceTime,
  pub future:      Option<FutureInsuranceTime>,
  /// Whole years, rounded down and capped at [`MAX_INSURANCE_YEARS`].
  pub total_years: u32,
}

/// A reduced `numerator / denominator` fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fraction {
  pub numerator:   u32,
  pub denominator: u32,
}

impl Fraction {
  /// `None` when the denominator is zero.
  pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
    if denominator == 0 {
      return None;
    }
    let divisor = gcd(numerator, denominator);
    Some(Self {
      numerator:   numerator / divisor,
      denominator: denominator / divisor,
    })
  }
}

fn gcd(a: u32, b: u32) -> u32 {
  if b == 0 { a } else { gcd(b, a % b) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
  pub regime:            Regime,
  /// Credited national total in whole years ("samlet trygdetid Norge").
  pub total_norway:      u32,
  /// Theoretical total; present only when a period is prorated.
  pub total_theoretical: Option<u32>,
  pub norway:            Option<InsuranceTimeFigure>,
  pub theoretical:       Option<InsuranceTimeFigure>,
  pub prorata_fraction:  Option<Fraction>,
  pub trace:             RuleTrace,
}

impl CalculationResult {
  /// True if either figure raised the four-fifths flag.
  pub fn below_four_fifths(&self) -> bool {
    [self.norway, self.theoretical]
      .iter()
      .flatten()
      .filter_map(|figure| figure.future)
      .any(|future| future.below_four_fifths)
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Compute the credited insurance time. `Ok(None)` means not yet assessed.
///
/// Fails only with [`Error::MissingFact`], when future periods are present
/// but the birthdate or deathdate needed to bound them is not.
pub fn compute_total(
  input: &CalculationInput<'_>,
) -> Result<Option<CalculationResult>> {
  let regime = Regime::select(input);

  let result = match regime {
    Regime::OccupationalInjury => CalculationResult {
      regime,
      total_norway: MAX_INSURANCE_YEARS,
      total_theoretical: None,
      norway: None,
      theoretical: None,
      prorata_fraction: None,
      trace: RuleTrace::new("occupational_injury", json!({
        "total_norway": MAX_INSURANCE_YEARS,
      })),
    },

    Regime::ManualPointYears { years } => {
      // Breakdown kept for the audit trail only; it has no bearing on the
      // total, so missing facts just leave it out.
      let breakdown = breakdown(input).ok();
      let total = years.min(MAX_INSURANCE_YEARS);
      CalculationResult {
        regime,
        total_norway: total,
        total_theoretical: None,
        norway: breakdown.as_ref().map(|b| b.norway),
        theoretical: breakdown.as_ref().and_then(|b| b.theoretical),
        prorata_fraction: breakdown.as_ref().and_then(|b| b.fraction),
        trace: RuleTrace::new("manual_point_years", json!({
          "point_year_override": years,
          "total_norway":        total,
        })),
      }
    }

    Regime::PeriodDerived => {
      let breakdown = breakdown(input)?;
      CalculationResult {
        regime,
        total_norway: breakdown.norway.total_years,
        total_theoretical: breakdown.theoretical.map(|t| t.total_years),
        norway: Some(breakdown.norway),
        theoretical: breakdown.theoretical,
        prorata_fraction: breakdown.fraction,
        trace: RuleTrace::new("period_derived", json!({
          "period_count":      input.periods.len(),
          "birthdate":         input.birthdate,
          "deathdate":         input.deathdate,
          "as_of":             input.as_of,
          "nordic_convention": input.nordic_convention,
          "norway_months":     breakdown.norway.actual.months,
          "theoretical_months": breakdown.theoretical.map(|t| t.actual.months),
        })),
      }
    }

    Regime::Unassessed => return Ok(None),
  };

  Ok(Some(result))
}

// ─── Period-derived breakdown ────────────────────────────────────────────────

struct Breakdown {
  norway:      InsuranceTimeFigure,
  theoretical: Option<InsuranceTimeFigure>,
  fraction:    Option<Fraction>,
}

fn breakdown(input: &CalculationInput<'_>) -> Result<Breakdown> {
  let ends = OpenEnds::resolve(input.birthdate, input.deathdate, input.as_of);
  let measured: Vec<(&InsurancePeriod, PeriodDuration)> = input
    .periods
    .iter()
    .zip(compute_period_durations(input.periods, ends))
    .map(|(p, computed)| (p, computed.duration))
    .collect();

  let actual_norway = actual_time(
    measured
      .iter()
      .filter(|(p, _)| p.is_actual() && !p.is_prorated)
      .map(|(_, duration)| *duration),
  );
  let actual_theoretical = actual_time(
    measured
      .iter()
      .filter(|(p, _)| p.is_actual())
      .map(|(_, duration)| *duration),
  );
  let future_periods: Vec<PeriodDuration> = measured
    .iter()
    .filter(|(p, _)| p.is_future())
    .map(|(_, duration)| *duration)
    .collect();

  let window = if future_periods.is_empty() {
    None
  } else {
    let birthdate = input.birthdate.ok_or(Error::MissingFact("birthdate"))?;
    let deathdate = input.deathdate.ok_or(Error::MissingFact("deathdate"))?;
    Some(FutureWindow::new(birthdate, deathdate))
  };
  let future_duration = PeriodDuration::accumulate(future_periods);

  let norway = figure(
    actual_norway,
    window.map(|w| w.credit(future_duration, actual_norway.months)),
  );

  let any_prorated = input.periods.iter().any(|p| p.is_prorated);
  let (theoretical, fraction) = if any_prorated {
    // Under the Nordic convention the four-fifths test is made against
    // Norwegian time alone.
    let tested_months = if input.nordic_convention {
      actual_norway.months
    } else {
      actual_theoretical.months
    };
    let theoretical = figure(
      actual_theoretical,
      window.map(|w| w.credit(future_duration, tested_months)),
    );
    let fraction = Fraction::new(actual_norway.months, actual_theoretical.months);
    (Some(theoretical), fraction)
  } else {
    (None, None)
  };

  Ok(Breakdown { norway, theoretical, fraction })
}

fn actual_time<I>(durations: I) -> ActualInsuranceTime
where
  I: IntoIterator<Item = PeriodDuration>,
{
  let duration = PeriodDuration::accumulate(durations);
  ActualInsuranceTime { duration, months: duration.total_months() }
}

fn figure(
  actual: ActualInsuranceTime,
  future: Option<FutureInsuranceTime>,
) -> InsuranceTimeFigure {
  let months = actual.months + future.map_or(0, |f| f.months);
  InsuranceTimeFigure {
    actual,
    future,
    total_years: (months / 12).min(MAX_INSURANCE_YEARS),
  }
}

/// The bounds future time is measured against for one person.
#[derive(Debug, Clone, Copy)]
struct FutureWindow {
  window_months:         u32,
  earning_period_months: u32,
}

impl FutureWindow {
  fn new(birthdate: NaiveDate, deathdate: NaiveDate) -> Self {
    // A deathdate past the boundary leaves an empty window.
    let window_months =
      PeriodDuration::inclusive(deathdate, upper_age_boundary(birthdate)).total_months();

    let earning_period_months = birthdate
      .checked_add_months(Months::new(EARNING_START_AGE * 12))
      .map_or(0, |start| PeriodDuration::between(start, deathdate).total_months());

    Self { window_months, earning_period_months }
  }

  fn credit(
    &self,
    duration: PeriodDuration,
    actual_months: u32,
  ) -> FutureInsuranceTime {
    FutureInsuranceTime {
      duration,
      months: duration.total_months().min(self.window_months),
      window_months: self.window_months,
      earning_period_months: self.earning_period_months,
      below_four_fifths: (actual_months as u64) * 5
        < (self.earning_period_months as u64) * 4,
    }
  }
}
