//! Carrying a record over to a new case revision ("revurdering").

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  grunnlag::PersonFacts,
  period::InsurancePeriod,
  record::InsuranceTimeRecord,
};

/// The statutory cause of a revision.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RevisionCause {
  /// Periodic indexation.
  Regulering,
  NewInformation,
  Appeal,
  Other,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessType {
  Automatic,
  Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionContext {
  pub cause:   RevisionCause,
  pub process: ProcessType,
}

impl RevisionContext {
  pub fn is_automatic_regulering(&self) -> bool {
    self.cause == RevisionCause::Regulering && self.process == ProcessType::Automatic
  }
}

/// What to do with the prior revision's record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CopyPlan<'a> {
  /// Nothing worth carrying over; start with an empty record.
  StartFresh,
  /// Deep-copy the prior record and recompute it.
  DeepCopy(&'a InsuranceTimeRecord),
}

/// Decide how to carry `prior` over. A missing prior record is treated like
/// one without any basis.
///
/// Fails with [`Error::MissingPriorData`] when there is no basis and the
/// revision is an automatic regulering: such a case cannot be regulated
/// without a caseworker.
pub fn plan_copy<'a>(
  prior: Option<&'a InsuranceTimeRecord>,
  prior_case_id: Uuid,
  ident: &str,
  context: RevisionContext,
) -> Result<CopyPlan<'a>> {
  match prior.filter(|r| r.has_basis()) {
    Some(record) => Ok(CopyPlan::DeepCopy(record)),
    None if context.is_automatic_regulering() => Err(Error::MissingPriorData {
      prior_case_id,
      ident: ident.to_owned(),
    }),
    None => Ok(CopyPlan::StartFresh),
  }
}

/// Build the record for `new_case_id` from the prior revision.
///
/// A copied record gets new ids throughout and is recomputed against `facts`
/// rather than trusting the prior cached result, since the facts may have
/// changed between revisions.
pub fn copy_to_revision(
  prior: Option<&InsuranceTimeRecord>,
  prior_case_id: Uuid,
  new_case_id: Uuid,
  facts: PersonFacts,
  context: RevisionContext,
  as_of: NaiveDate,
) -> Result<InsuranceTimeRecord> {
  match plan_copy(prior, prior_case_id, &facts.ident, context)? {
    CopyPlan::StartFresh => Ok(InsuranceTimeRecord::new(new_case_id, facts)),
    CopyPlan::DeepCopy(prior) => deep_copy(prior, new_case_id, facts).recomputed(as_of),
  }
}

fn deep_copy(
  prior: &InsuranceTimeRecord,
  new_case_id: Uuid,
  facts: PersonFacts,
) -> InsuranceTimeRecord {
  InsuranceTimeRecord {
    id: Uuid::new_v4(),
    case_id: new_case_id,
    ident: prior.ident.clone(),
    created_at: Utc::now(),
    periods: prior
      .periods
      .iter()
      .map(|p| InsurancePeriod { id: Uuid::new_v4(), ..p.clone() })
      .collect(),
    computed_result: prior.computed_result.clone(),
    point_year_override: prior.point_year_override,
    occupational_injury: prior.occupational_injury,
    nordic_convention: prior.nordic_convention,
    result_override: prior.result_override.clone(),
    facts,
  }
}
