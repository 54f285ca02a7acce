//! Ordering and integrity checks over one person's period set.
//!
//! Conflicts are classified per pair of periods so a caller can point at the
//! offending entries. Nothing here merges, truncates or otherwise repairs a
//! period; a conflicting set is reported and left as it was.

use std::{cmp::Ordering, fmt};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::period::InsurancePeriod;

// ─── Conflicts ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
  /// The two periods share at least one day.
  Overlap,
  /// Days are missing between two consecutive actual periods.
  Gap,
  /// A future period starts before an actual period; future time belongs
  /// after all evidenced time.
  FutureNotTerminal,
}

/// A classified conflict between two periods. `first` starts no later than
/// `second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
  pub kind:   ConflictKind,
  pub first:  Uuid,
  pub second: Uuid,
}

impl fmt::Display for Conflict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({}, {})", self.kind, self.first, self.second)
  }
}

/// Every conflict found in a period set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationError {
  pub conflicts: Vec<Conflict>,
}

impl fmt::Display for NormalizationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("conflicting periods:")?;
    for conflict in &self.conflicts {
      write!(f, " {conflict}")?;
    }
    Ok(())
  }
}

impl std::error::Error for NormalizationError {}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Sort by start date and require a contiguous, non-overlapping sequence:
/// each actual period must end exactly one day before the next actual period
/// starts. Future periods are not tiled, but must come after every actual
/// period.
pub fn normalize(
  periods: Vec<InsurancePeriod>,
) -> Result<Vec<InsurancePeriod>, NormalizationError> {
  let sorted = sorted(periods);
  let mut conflicts = overlaps(&sorted);
  conflicts.extend(gaps(&sorted));
  conflicts.extend(misplaced_future(&sorted));
  finish(sorted, conflicts)
}

/// Storage-time check: sort by start date and reject overlaps. Gaps are
/// allowed; full coverage is a presentation concern (see [`coverage_gaps`]).
pub fn arrange(
  periods: Vec<InsurancePeriod>,
) -> Result<Vec<InsurancePeriod>, NormalizationError> {
  let sorted = sorted(periods);
  let conflicts = overlaps(&sorted);
  finish(sorted, conflicts)
}

/// Gaps between consecutive actual periods and future periods placed before
/// actual ones, for display.
pub fn coverage_gaps(periods: &[InsurancePeriod]) -> Vec<Conflict> {
  let sorted = sorted(periods.to_vec());
  let mut conflicts = gaps(&sorted);
  conflicts.extend(misplaced_future(&sorted));
  conflicts
}

// ─── Internals ───────────────────────────────────────────────────────────────

fn finish(
  sorted: Vec<InsurancePeriod>,
  conflicts: Vec<Conflict>,
) -> Result<Vec<InsurancePeriod>, NormalizationError> {
  if conflicts.is_empty() {
    Ok(sorted)
  } else {
    Err(NormalizationError { conflicts })
  }
}

fn sorted(mut periods: Vec<InsurancePeriod>) -> Vec<InsurancePeriod> {
  periods.sort_by(compare);
  periods
}

/// Start date, then end date with open ends last, then id.
fn compare(a: &InsurancePeriod, b: &InsurancePeriod) -> Ordering {
  let end = |p: &InsurancePeriod| p.interval.to().unwrap_or(NaiveDate::MAX);
  a.interval
    .from()
    .cmp(&b.interval.from())
    .then_with(|| end(a).cmp(&end(b)))
    .then_with(|| a.id.cmp(&b.id))
}

/// Every overlapping pair, not only adjacent ones: a long period can overlap
/// several later ones.
fn overlaps(sorted: &[InsurancePeriod]) -> Vec<Conflict> {
  let mut conflicts = Vec::new();
  for (j, later) in sorted.iter().enumerate() {
    for earlier in &sorted[..j] {
      if earlier.interval.overlaps(&later.interval) {
        conflicts.push(Conflict {
          kind:   ConflictKind::Overlap,
          first:  earlier.id,
          second: later.id,
        });
      }
    }
  }
  conflicts
}

fn gaps(sorted: &[InsurancePeriod]) -> Vec<Conflict> {
  let actual: Vec<&InsurancePeriod> =
    sorted.iter().filter(|p| p.is_actual()).collect();

  actual
    .windows(2)
    .filter_map(|pair| {
      let (earlier, later) = (pair[0], pair[1]);
      let next_day = earlier.interval.to()?.checked_add_days(Days::new(1))?;
      (next_day < later.interval.from()).then_some(Conflict {
        kind:   ConflictKind::Gap,
        first:  earlier.id,
        second: later.id,
      })
    })
    .collect()
}

/// Each future period followed by an actual period, paired with the first
/// such actual period.
fn misplaced_future(sorted: &[InsurancePeriod]) -> Vec<Conflict> {
  sorted
    .iter()
    .enumerate()
    .filter(|(_, p)| p.is_future())
    .filter_map(|(i, future)| {
      let later = sorted[i + 1..].iter().find(|p| p.is_actual())?;
      Some(Conflict {
        kind:   ConflictKind::FutureNotTerminal,
        first:  future.id,
        second: later.id,
      })
    })
    .collect()
}
