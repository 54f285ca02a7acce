//! Period types: the dated residence/work intervals insurance time is built
//! from.
//!
//! An [`InsurancePeriod`] can only be built through [`InsurancePeriod::new`]
//! (or deserialised), and both paths reject an interval whose end precedes
//! its start. Nothing downstream ever sees an inverted interval.

use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, Result, calculation::upper_age_boundary};

/// Days per month when carrying accumulated days into months.
pub const DAYS_PER_MONTH: u32 = 30;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Whether a period is evidenced or presumed.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PeriodKind {
  /// Evidenced residence or work ("faktisk trygdetid").
  Actual,
  /// Presumed insurance time from the date of death up to the upper age
  /// boundary ("fremtidig trygdetid").
  Future,
}

// ─── Country ─────────────────────────────────────────────────────────────────

/// An ISO 3166-1 alpha-3 country code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
  pub fn parse(raw: &str) -> Result<Self> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
      Ok(Self(code))
    } else {
      Err(Error::InvalidCountryCode(raw.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for CountryCode {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<CountryCode> for String {
  fn from(code: CountryCode) -> Self { code.0 }
}

impl fmt::Display for CountryCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Who or what asserted a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodSource {
  /// Entered by hand without further attribution.
  #[default]
  Manual,
  /// Registered by a named caseworker.
  Caseworker { ident: String },
  /// Imported from a population or employment registry.
  Registry { name: String },
  /// Derived from regulation, e.g. a generated future period.
  Regulation,
}

// ─── Interval ────────────────────────────────────────────────────────────────

/// An inclusive date interval whose end may be open.
///
/// `to >= from` always holds; deserialisation goes through the same check as
/// [`DateInterval::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct DateInterval {
  from: NaiveDate,
  to:   Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RawInterval {
  from: NaiveDate,
  to:   Option<NaiveDate>,
}

impl TryFrom<RawInterval> for DateInterval {
  type Error = Error;

  fn try_from(raw: RawInterval) -> Result<Self> { Self::new(raw.from, raw.to) }
}

impl DateInterval {
  pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self> {
    if let Some(to) = to
      && to < from
    {
      return Err(Error::InvertedInterval { from, to });
    }
    Ok(Self { from, to })
  }

  pub fn open(from: NaiveDate) -> Self { Self { from, to: None } }

  pub fn from(&self) -> NaiveDate { self.from }

  pub fn to(&self) -> Option<NaiveDate> { self.to }

  pub fn is_open(&self) -> bool { self.to.is_none() }

  /// The last day of the interval, with an open end resolved to `open_end`.
  /// Never earlier than `from`.
  pub fn end_or(&self, open_end: NaiveDate) -> NaiveDate {
    self.to.unwrap_or(open_end).max(self.from)
  }

  /// True if the two intervals share at least one day. Open ends extend
  /// indefinitely.
  pub fn overlaps(&self, other: &DateInterval) -> bool {
    let starts_before_other_ends = other.to.is_none_or(|to| self.from <= to);
    let other_starts_before_end = self.to.is_none_or(|to| other.from <= to);
    starts_before_other_ends && other_starts_before_end
  }
}

// ─── Duration ────────────────────────────────────────────────────────────────

/// A calendar duration as a `(years, months, days)` tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodDuration {
  pub years:  u32,
  pub months: u32,
  pub days:   u32,
}

impl PeriodDuration {
  pub const ZERO: Self = Self { years: 0, months: 0, days: 0 };

  pub const fn new(years: u32, months: u32, days: u32) -> Self {
    Self { years, months, days }
  }

  /// Calendar-aware span from `start` (inclusive) to `end` (exclusive).
  ///
  /// Whole months are counted first; the remaining days are measured from the
  /// date reached by adding those months to `start`, so month lengths are
  /// respected. Returns [`PeriodDuration::ZERO`] when `end <= start`.
  pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
    if end <= start {
      return Self::ZERO;
    }

    let mut total_months = (end.year() - start.year()) * 12
      + (end.month() as i32 - start.month() as i32);
    let mut days = end.day() as i64 - start.day() as i64;

    if total_months > 0 && days < 0 {
      total_months -= 1;
      days = start
        .checked_add_months(Months::new(total_months as u32))
        .map(|anchor| (end - anchor).num_days())
        .unwrap_or(0);
    }

    Self {
      years:  (total_months / 12) as u32,
      months: (total_months % 12) as u32,
      days:   days as u32,
    }
  }

  /// Span covering both `from` and `to` (inclusive on both ends).
  pub fn inclusive(from: NaiveDate, to: NaiveDate) -> Self {
    let end = to.checked_add_days(Days::new(1)).unwrap_or(to);
    Self::between(from, end)
  }

  /// Sum durations component-wise, then carry days into months
  /// ([`DAYS_PER_MONTH`]) and months into years. Days left below one month are
  /// kept in `days`.
  pub fn accumulate<I>(durations: I) -> Self
  where
    I: IntoIterator<Item = PeriodDuration>,
  {
    let (years, months, days) = durations.into_iter().fold(
      (0u64, 0u64, 0u64),
      |(y, m, d), p| (y + p.years as u64, m + p.months as u64, d + p.days as u64),
    );

    let months = months + days / DAYS_PER_MONTH as u64;
    let days = days % DAYS_PER_MONTH as u64;
    let years = years + months / 12;
    let months = months % 12;

    Self {
      years:  years.min(u32::MAX as u64) as u32,
      months: months as u32,
      days:   days as u32,
    }
  }

  /// Whole months; remaining days are dropped.
  pub fn total_months(&self) -> u32 {
    self.years.saturating_mul(12).saturating_add(self.months)
  }
}

impl fmt::Display for PeriodDuration {
  /// ISO 8601 duration form, e.g. `P3Y1M3D`.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "P{}Y{}M{}D", self.years, self.months, self.days)
  }
}

// ─── Rule trace ──────────────────────────────────────────────────────────────

/// Record of which rule produced a derived value, and from what inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrace {
  pub rule:   String,
  pub inputs: serde_json::Value,
}

impl RuleTrace {
  pub fn new(rule: &str, inputs: serde_json::Value) -> Self {
    Self { rule: rule.to_owned(), inputs }
  }
}

/// A period's derived duration together with the trace that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedDuration {
  pub duration: PeriodDuration,
  pub trace:    RuleTrace,
}

// ─── Period ──────────────────────────────────────────────────────────────────

/// One dated residence/work interval for a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePeriod {
  pub id:                     Uuid,
  pub kind:                   PeriodKind,
  pub country:                CountryCode,
  pub interval:               DateInterval,
  /// The period starts at a pension-point-year boundary; its effective start
  /// is rounded back to 1 January.
  pub counts_at_period_start: bool,
  /// The period ends at a pension-point-year boundary; its effective end is
  /// rounded forward to 31 December.
  pub counts_at_period_end:   bool,
  /// Counts toward a pro-rata fraction instead of full national credit.
  pub is_prorated:            bool,
  /// Cached result of [`compute_period_durations`]; refreshed whenever the
  /// owning record is recomputed.
  pub computed_duration:      Option<ComputedDuration>,
  pub justification:          Option<String>,
  pub source:                 PeriodSource,
}

/// Input to [`InsurancePeriod::new`].
///
/// With `id: Some(..)` the period replaces the stored period of the same id.
#[derive(Debug, Clone)]
pub struct NewPeriod {
  pub id:                     Option<Uuid>,
  pub kind:                   PeriodKind,
  pub country:                String,
  pub from:                   NaiveDate,
  pub to:                     Option<NaiveDate>,
  pub counts_at_period_start: bool,
  pub counts_at_period_end:   bool,
  pub is_prorated:            bool,
  pub justification:          Option<String>,
  pub source:                 PeriodSource,
}

impl NewPeriod {
  /// Convenience constructor with all optional fields set to their defaults.
  pub fn new(
    kind: PeriodKind,
    country: impl Into<String>,
    from: NaiveDate,
    to: Option<NaiveDate>,
  ) -> Self {
    Self {
      id: None,
      kind,
      country: country.into(),
      from,
      to,
      counts_at_period_start: false,
      counts_at_period_end: false,
      is_prorated: false,
      justification: None,
      source: PeriodSource::default(),
    }
  }
}

impl InsurancePeriod {
  /// Validate `input` and build a period. Fails on an inverted interval or a
  /// malformed country code.
  ///
  /// Closed periods get their duration cached immediately; open periods are
  /// measured when the owning record is computed.
  pub fn new(input: NewPeriod) -> Result<Self> {
    let interval = DateInterval::new(input.from, input.to)?;
    let country = CountryCode::parse(&input.country)?;

    let mut period = Self {
      id: input.id.unwrap_or_else(Uuid::new_v4),
      kind: input.kind,
      country,
      interval,
      counts_at_period_start: input.counts_at_period_start,
      counts_at_period_end: input.counts_at_period_end,
      is_prorated: input.is_prorated,
      computed_duration: None,
      justification: input.justification,
      source: input.source,
    };

    if let Some(to) = interval.to() {
      let ends = OpenEnds { actual: to, future: to };
      period.computed_duration = Some(compute_period_duration(&period, ends));
    }
    Ok(period)
  }

  pub fn is_actual(&self) -> bool { self.kind == PeriodKind::Actual }

  pub fn is_future(&self) -> bool { self.kind == PeriodKind::Future }

  /// The cached duration, or zero if the period was never measured.
  pub fn duration(&self) -> PeriodDuration {
    self
      .computed_duration
      .as_ref()
      .map(|c| c.duration)
      .unwrap_or_default()
  }
}

// ─── Duration rule ───────────────────────────────────────────────────────────

/// Where open-ended periods stop when measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenEnds {
  /// Deathdate, or the as-of date while the person is alive.
  pub actual: NaiveDate,
  /// 31 December of the upper-age year.
  pub future: NaiveDate,
}

impl OpenEnds {
  /// Without a birthdate there is no upper-age year, and open future periods
  /// fall back to the actual end. The calculation refuses to credit future
  /// time without a birthdate anyway.
  pub fn resolve(
    birthdate: Option<NaiveDate>,
    deathdate: Option<NaiveDate>,
    as_of: NaiveDate,
  ) -> Self {
    let actual = deathdate.unwrap_or(as_of);
    let future = birthdate.map_or(actual, upper_age_boundary);
    Self { actual, future }
  }

  pub fn for_kind(&self, kind: PeriodKind) -> NaiveDate {
    match kind {
      PeriodKind::Actual => self.actual,
      PeriodKind::Future => self.future,
    }
  }
}

/// The bounds a period is measured over, after point-year rounding.
fn effective_bounds(
  period: &InsurancePeriod,
  ends: OpenEnds,
) -> (NaiveDate, NaiveDate) {
  let from = period.interval.from();
  let to = period.interval.end_or(ends.for_kind(period.kind));

  let from = if period.counts_at_period_start {
    NaiveDate::from_ymd_opt(from.year(), 1, 1).unwrap_or(from)
  } else {
    from
  };
  let to = if period.counts_at_period_end {
    NaiveDate::from_ymd_opt(to.year(), 12, 31).unwrap_or(to)
  } else {
    to
  };

  (from, to)
}

/// Inclusive calendar span of a single period, e.g. 2020-01-01 → 2023-02-03
/// is `P3Y1M3D` and a single day is `P0Y0M1D`.
///
/// Point-year rounding is applied without regard to other periods; use
/// [`compute_period_durations`] to measure a whole set.
pub fn compute_period_duration(
  period: &InsurancePeriod,
  ends: OpenEnds,
) -> ComputedDuration {
  let (from, to) = effective_bounds(period, ends);
  measured(period, ends, from, to)
}

/// Measure every period of a set, returned in input order.
///
/// Point-year rounding only extends a period into days no other period
/// holds: a rounded start never reaches back past the previous period's
/// measured end, and a rounded end stops the day before the next period
/// starts. The period's own dates are always counted in full.
pub fn compute_period_durations(
  periods: &[InsurancePeriod],
  ends: OpenEnds,
) -> Vec<ComputedDuration> {
  let mut order: Vec<usize> = (0..periods.len()).collect();
  order.sort_by_key(|&i| (periods[i].interval.from(), periods[i].id));

  let mut durations: Vec<Option<ComputedDuration>> = vec![None; periods.len()];
  let mut claimed_until: Option<NaiveDate> = None;

  for (pos, &i) in order.iter().enumerate() {
    let period = &periods[i];
    let own_from = period.interval.from();
    let own_to = period.interval.end_or(ends.for_kind(period.kind));
    let (mut from, mut to) = effective_bounds(period, ends);

    if let Some(after) = claimed_until.and_then(|end| end.succ_opt()) {
      from = from.max(after).min(own_from);
    }
    let next_from = order.get(pos + 1).map(|&j| periods[j].interval.from());
    if let Some(before) = next_from.and_then(|start| start.pred_opt()) {
      to = to.min(before).max(own_to);
    }

    claimed_until = Some(claimed_until.map_or(to, |end| end.max(to)));
    durations[i] = Some(measured(period, ends, from, to));
  }

  durations.into_iter().flatten().collect()
}

fn measured(
  period: &InsurancePeriod,
  ends: OpenEnds,
  from: NaiveDate,
  to: NaiveDate,
) -> ComputedDuration {
  let duration = PeriodDuration::inclusive(from, to);

  ComputedDuration {
    duration,
    trace: RuleTrace::new(
      "period_duration",
      json!({
        "period_id":              period.id,
        "kind":                   period.kind,
        "from":                   period.interval.from(),
        "to":                     period.interval.to(),
        "open_end":               period.interval.is_open().then(|| ends.for_kind(period.kind)),
        "counts_at_period_start": period.counts_at_period_start,
        "counts_at_period_end":   period.counts_at_period_end,
        "effective_from":         from,
        "effective_to":           to,
        "result":                 duration.to_string(),
      }),
    ),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn period(from: NaiveDate, to: Option<NaiveDate>) -> InsurancePeriod {
    InsurancePeriod::new(NewPeriod::new(PeriodKind::Actual, "NOR", from, to))
      .unwrap()
  }

  #[test]
  fn inverted_interval_is_rejected() {
    let err = InsurancePeriod::new(NewPeriod::new(
      PeriodKind::Actual,
      "NOR",
      d(2020, 1, 2),
      Some(d(2020, 1, 1)),
    ))
    .unwrap_err();
    assert!(matches!(err, Error::InvertedInterval { .. }));
  }

  #[test]
  fn inverted_interval_is_rejected_on_deserialise() {
    let raw = r#"{"from":"2020-05-01","to":"2020-04-30"}"#;
    assert!(serde_json::from_str::<DateInterval>(raw).is_err());

    let ok = r#"{"from":"2020-05-01","to":null}"#;
    let interval: DateInterval = serde_json::from_str(ok).unwrap();
    assert!(interval.is_open());
  }

  #[test]
  fn duration_is_calendar_exact() {
    let p = period(d(2020, 1, 1), Some(d(2023, 2, 3)));
    assert_eq!(p.duration(), PeriodDuration::new(3, 1, 3));
  }

  #[test]
  fn single_day_period_is_one_day() {
    let p = period(d(2023, 1, 1), Some(d(2023, 1, 1)));
    assert_eq!(p.duration(), PeriodDuration::new(0, 0, 1));
  }

  #[test]
  fn between_respects_short_months() {
    assert_eq!(
      PeriodDuration::between(d(2020, 1, 31), d(2020, 3, 1)),
      PeriodDuration::new(0, 1, 1),
    );
    assert_eq!(
      PeriodDuration::inclusive(d(2021, 2, 1), d(2021, 2, 28)),
      PeriodDuration::new(0, 1, 0),
    );
  }

  fn with_flags(
    from: NaiveDate,
    to: NaiveDate,
    at_start: bool,
    at_end: bool,
  ) -> InsurancePeriod {
    let mut input = NewPeriod::new(PeriodKind::Actual, "NOR", from, Some(to));
    input.counts_at_period_start = at_start;
    input.counts_at_period_end = at_end;
    InsurancePeriod::new(input).unwrap()
  }

  #[test]
  fn open_period_is_measured_against_resolved_end() {
    let p = period(d(2000, 1, 1), None);
    assert!(p.computed_duration.is_none());

    let ends = OpenEnds::resolve(None, Some(d(2009, 12, 31)), d(2025, 1, 1));
    let measured = compute_period_duration(&p, ends);
    assert_eq!(measured.duration, PeriodDuration::new(10, 0, 0));
    assert_eq!(measured.trace.inputs["open_end"], "2009-12-31");
  }

  #[test]
  fn open_future_period_runs_to_upper_age_year() {
    let future =
      InsurancePeriod::new(NewPeriod::new(PeriodKind::Future, "NOR", d(2020, 1, 1), None))
        .unwrap();
    let ends =
      OpenEnds::resolve(Some(d(1960, 5, 17)), Some(d(2019, 12, 31)), d(2025, 1, 1));
    assert_eq!(ends.future, d(2026, 12, 31));
    assert_eq!(
      compute_period_duration(&future, ends).duration,
      PeriodDuration::new(7, 0, 0),
    );
  }

  #[test]
  fn rounded_start_does_not_reclaim_previous_period() {
    let earlier = period(d(2000, 1, 1), Some(d(2010, 11, 30)));
    let later = with_flags(d(2010, 12, 1), d(2016, 1, 31), true, false);
    let ends = OpenEnds::resolve(None, None, d(2025, 1, 1));

    // Alone, the later period is rounded back to 2010-01-01.
    assert_eq!(later.duration(), PeriodDuration::new(6, 1, 0));

    let measured = compute_period_durations(&[later.clone(), earlier.clone()], ends);
    assert_eq!(measured[0].duration, PeriodDuration::new(5, 2, 0));
    assert_eq!(measured[0].trace.inputs["effective_from"], "2010-12-01");
    assert_eq!(measured[1].duration, PeriodDuration::new(10, 11, 0));
  }

  #[test]
  fn rounding_into_a_gap_is_shared_not_doubled() {
    let a = with_flags(d(2005, 1, 1), d(2010, 3, 31), false, true);
    let b = with_flags(d(2010, 9, 1), d(2012, 12, 31), true, false);
    let ends = OpenEnds::resolve(None, None, d(2025, 1, 1));

    let measured = compute_period_durations(&[a, b], ends);
    assert_eq!(measured[0].trace.inputs["effective_to"], "2010-08-31");
    assert_eq!(measured[1].trace.inputs["effective_from"], "2010-09-01");
    let total = PeriodDuration::accumulate(measured.iter().map(|m| m.duration));
    assert_eq!(total, PeriodDuration::new(8, 0, 0));
  }

  #[test]
  fn point_year_flags_round_to_year_boundaries() {
    let mut input =
      NewPeriod::new(PeriodKind::Actual, "NOR", d(2010, 6, 15), Some(d(2012, 3, 1)));
    input.counts_at_period_start = true;
    input.counts_at_period_end = true;
    let p = InsurancePeriod::new(input).unwrap();

    assert_eq!(p.duration(), PeriodDuration::new(3, 0, 0));
    let trace = &p.computed_duration.as_ref().unwrap().trace;
    assert_eq!(trace.rule, "period_duration");
    assert_eq!(trace.inputs["effective_from"], "2010-01-01");
  }

  #[test]
  fn accumulate_carries_days_and_months() {
    let total = PeriodDuration::accumulate([
      PeriodDuration::new(1, 11, 20),
      PeriodDuration::new(0, 0, 15),
      PeriodDuration::new(2, 1, 0),
    ]);
    assert_eq!(total, PeriodDuration::new(4, 1, 5));
    assert_eq!(total.total_months(), 49);
  }

  #[test]
  fn country_code_is_normalised() {
    assert_eq!(CountryCode::parse(" swe ").unwrap().as_str(), "SWE");
    assert!(CountryCode::parse("NO").is_err());
    assert!(CountryCode::parse("N0R").is_err());
  }

  #[test]
  fn overlap_detection_handles_open_ends() {
    let a = DateInterval::new(d(2000, 1, 1), Some(d(2000, 12, 31))).unwrap();
    let b = DateInterval::new(d(2001, 1, 1), Some(d(2001, 12, 31))).unwrap();
    let open = DateInterval::open(d(2001, 6, 1));
    assert!(!a.overlaps(&b));
    assert!(b.overlaps(&open));
    assert!(open.overlaps(&b));
    assert!(!a.overlaps(&open));
  }

  #[test]
  fn kind_round_trips_through_strum() {
    assert_eq!(PeriodKind::Future.to_string(), "future");
    assert_eq!("actual".parse::<PeriodKind>().unwrap(), PeriodKind::Actual);
  }
}
