//! The operations exposed to the workflow and revision layers.
//!
//! [`TrygdetidService`] wires the pure record operations to a
//! [`TrygdetidStore`] and a [`GrunnlagSource`]. Each mutation is a
//! read-modify-write over the whole record: load, derive a new value, write
//! it back. Failed derivations write nothing.

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error,
  grunnlag::{GrunnlagSource, PersonFacts},
  period::{InsurancePeriod, NewPeriod},
  record::{InsuranceTimeRecord, ResultOverride},
  revision::{RevisionContext, copy_to_revision},
  store::TrygdetidStore,
};

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error(transparent)]
  Domain(#[from] Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("fact source error: {0}")]
  Facts(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ServiceError {
  ServiceError::Store(Box::new(e))
}

fn facts_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ServiceError {
  ServiceError::Facts(Box::new(e))
}

/// A change to one period of a record.
#[derive(Debug, Clone)]
pub enum PeriodChange {
  /// Insert, or replace the period whose id matches `NewPeriod::id`.
  Upsert(NewPeriod),
  Remove(Uuid),
}

/// Outcome of [`TrygdetidService::compute_for_person`].
#[derive(Debug, Clone)]
pub enum Assessment {
  Assessed(InsuranceTimeRecord),
  /// No figure yet. Carries the record if one exists.
  NotYetAssessed(Option<InsuranceTimeRecord>),
}

pub struct TrygdetidService<S, G> {
  store:    S,
  grunnlag: G,
}

impl<S, G> TrygdetidService<S, G>
where
  S: TrygdetidStore,
  G: GrunnlagSource,
{
  pub fn new(store: S, grunnlag: G) -> Self { Self { store, grunnlag } }

  pub fn store(&self) -> &S { &self.store }

  fn today() -> NaiveDate { Utc::now().date_naive() }

  async fn facts(
    &self,
    case_id: Uuid,
    ident: &str,
  ) -> Result<PersonFacts, ServiceError> {
    self
      .grunnlag
      .person_facts(case_id, ident)
      .await
      .map_err(facts_err)?
      .ok_or_else(|| {
        Error::FactsUnavailable { case_id, ident: ident.to_owned() }.into()
      })
  }

  async fn load(&self, record_id: Uuid) -> Result<InsuranceTimeRecord, ServiceError> {
    self
      .store
      .get(record_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::RecordNotFound(record_id).into())
  }

  async fn save(
    &self,
    record: InsuranceTimeRecord,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    self.store.update(record.clone()).await.map_err(store_err)?;
    log_outcome(&record);
    Ok(record)
  }

  // ── Records ───────────────────────────────────────────────────────────

  /// Create an empty record for a person in a case. At most one record may
  /// exist per `(case, person)`.
  pub async fn create(
    &self,
    case_id: Uuid,
    ident: &str,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    if self.store.find(case_id, ident).await.map_err(store_err)?.is_some() {
      return Err(Error::RecordExists { case_id, ident: ident.to_owned() }.into());
    }

    let facts = self.facts(case_id, ident).await?;
    let record = InsuranceTimeRecord::new(case_id, facts);
    self.store.insert(record.clone()).await.map_err(store_err)?;

    info!(%case_id, ident, record_id = %record.id, "created trygdetid");
    Ok(record)
  }

  /// The current figure for a person, recomputing first if the fact source
  /// has a newer snapshot than the one the record was computed from.
  pub async fn compute_for_person(
    &self,
    case_id: Uuid,
    ident: &str,
  ) -> Result<Assessment, ServiceError> {
    let Some(mut record) = self.store.find(case_id, ident).await.map_err(store_err)?
    else {
      return Ok(Assessment::NotYetAssessed(None));
    };

    let latest = self
      .grunnlag
      .person_facts(case_id, ident)
      .await
      .map_err(facts_err)?;
    if let Some(facts) = latest
      && facts.version > record.facts.version
    {
      warn!(
        %case_id,
        ident,
        record_id = %record.id,
        from = record.facts.version,
        to = facts.version,
        "fact snapshot is stale; recomputing",
      );
      record = self.save(record.with_facts(facts, Self::today())?).await?;
    }

    Ok(if record.effective_total().is_some() {
      Assessment::Assessed(record)
    } else {
      Assessment::NotYetAssessed(Some(record))
    })
  }

  pub async fn list_for_case(
    &self,
    case_id: Uuid,
  ) -> Result<Vec<InsuranceTimeRecord>, ServiceError> {
    self.store.list_for_case(case_id).await.map_err(store_err)
  }

  /// Destroy every record of a case.
  pub async fn delete_case(&self, case_id: Uuid) -> Result<usize, ServiceError> {
    let removed = self.store.delete_case(case_id).await.map_err(store_err)?;
    info!(%case_id, removed, "deleted trygdetid for case");
    Ok(removed)
  }

  // ── Mutations ─────────────────────────────────────────────────────────

  pub async fn apply_period_change(
    &self,
    record_id: Uuid,
    change: PeriodChange,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    let record = self.load(record_id).await?;

    let updated = match change {
      PeriodChange::Upsert(input) => {
        let period = InsurancePeriod::new(input)?;
        debug!(%record_id, period_id = %period.id, kind = %period.kind, "upserting period");
        record.upsert_period(period, Self::today())
      }
      PeriodChange::Remove(period_id) => {
        debug!(%record_id, %period_id, "removing period");
        record.remove_period(period_id, Self::today())
      }
    };

    let updated = updated.inspect_err(|e| {
      if let Error::Normalization(conflicts) = e {
        info!(%record_id, %conflicts, "period change rejected");
      }
    })?;
    self.save(updated).await
  }

  pub async fn override_total(
    &self,
    record_id: Uuid,
    value: ResultOverride,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    let record = self.load(record_id).await?;
    info!(%record_id, total = value.total_norway, "overriding trygdetid");
    self.save(record.override_result(value)?).await
  }

  pub async fn override_occupational_injury(
    &self,
    record_id: Uuid,
    flag: bool,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    let record = self.load(record_id).await?;
    self
      .save(record.set_occupational_injury(flag, Self::today())?)
      .await
  }

  pub async fn set_point_year_override(
    &self,
    record_id: Uuid,
    years: Option<u32>,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    let record = self.load(record_id).await?;
    self
      .save(record.set_point_year_override(years, Self::today())?)
      .await
  }

  pub async fn set_nordic_convention(
    &self,
    record_id: Uuid,
    flag: bool,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    let record = self.load(record_id).await?;
    self
      .save(record.set_nordic_convention(flag, Self::today())?)
      .await
  }

  // ── Revisions ─────────────────────────────────────────────────────────

  /// Carry a person's record from the prior finalised case over to a new
  /// revision. See [`crate::revision::plan_copy`] for the rules.
  pub async fn copy_from_prior_revision(
    &self,
    new_case_id: Uuid,
    prior_case_id: Uuid,
    ident: &str,
    context: RevisionContext,
  ) -> Result<InsuranceTimeRecord, ServiceError> {
    if self.store.find(new_case_id, ident).await.map_err(store_err)?.is_some() {
      return Err(
        Error::RecordExists { case_id: new_case_id, ident: ident.to_owned() }.into(),
      );
    }

    let prior = self
      .store
      .find(prior_case_id, ident)
      .await
      .map_err(store_err)?;
    let facts = self.facts(new_case_id, ident).await?;

    let record = copy_to_revision(
      prior.as_ref(),
      prior_case_id,
      new_case_id,
      facts,
      context,
      Self::today(),
    )
    .inspect_err(|e| {
      if matches!(e, Error::MissingPriorData { .. }) {
        warn!(%new_case_id, %prior_case_id, cause = %context.cause, "revision needs manual trygdetid");
      }
    })?;

    self.store.insert(record.clone()).await.map_err(store_err)?;
    info!(
      %new_case_id,
      %prior_case_id,
      ident,
      record_id = %record.id,
      copied = record.has_basis(),
      "carried trygdetid over to revision",
    );
    Ok(record)
  }
}

fn log_outcome(record: &InsuranceTimeRecord) {
  debug!(
    record_id = %record.id,
    state = ?record.state(),
    total = ?record.effective_total(),
    "saved trygdetid",
  );
  if let Some(result) = &record.computed_result
    && result.below_four_fifths()
  {
    warn!(
      record_id = %record.id,
      "actual trygdetid is below four-fifths of the earning period",
    );
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::{
    memory::{MemoryStore, StaticGrunnlag},
    normalize::ConflictKind,
    period::PeriodKind,
    revision::{ProcessType, RevisionCause},
  };

  const IDENT: &str = "01016012345";

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn facts(version: u64) -> PersonFacts {
    PersonFacts {
      ident: IDENT.into(),
      birthdate: Some(d(1960, 1, 1)),
      deathdate: Some(d(2020, 1, 1)),
      version,
    }
  }

  fn service_for(cases: &[Uuid]) -> TrygdetidService<MemoryStore, StaticGrunnlag> {
    let grunnlag = StaticGrunnlag::new();
    for case_id in cases {
      grunnlag.put(*case_id, facts(1)).unwrap();
    }
    TrygdetidService::new(MemoryStore::new(), grunnlag)
  }

  fn upsert(from: NaiveDate, to: NaiveDate) -> PeriodChange {
    PeriodChange::Upsert(NewPeriod::new(PeriodKind::Actual, "NOR", from, Some(to)))
  }

  #[tokio::test]
  async fn create_twice_for_same_person_fails() {
    let case_id = Uuid::new_v4();
    let service = service_for(&[case_id]);
    service.create(case_id, IDENT).await.unwrap();

    let err = service.create(case_id, IDENT).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(Error::RecordExists { .. })));
  }

  #[tokio::test]
  async fn create_without_facts_fails() {
    let service = service_for(&[]);
    let err = service.create(Uuid::new_v4(), IDENT).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(Error::FactsUnavailable { .. })));
  }

  #[tokio::test]
  async fn period_changes_recompute_and_persist() {
    let case_id = Uuid::new_v4();
    let service = service_for(&[case_id]);
    let record = service.create(case_id, IDENT).await.unwrap();

    for (from, to) in [
      (d(1990, 1, 1), d(1999, 12, 31)),
      (d(2000, 1, 1), d(2009, 12, 31)),
      (d(2010, 1, 1), d(2011, 12, 31)),
    ] {
      service.apply_period_change(record.id, upsert(from, to)).await.unwrap();
    }

    let Assessment::Assessed(stored) =
      service.compute_for_person(case_id, IDENT).await.unwrap()
    else {
      panic!("expected an assessed record");
    };
    assert_eq!(stored.effective_total(), Some(22));
  }

  #[tokio::test]
  async fn overlapping_period_leaves_stored_set_unchanged() {
    let case_id = Uuid::new_v4();
    let service = service_for(&[case_id]);
    let record = service.create(case_id, IDENT).await.unwrap();
    let before = service
      .apply_period_change(record.id, upsert(d(2000, 1, 1), d(2009, 12, 31)))
      .await
      .unwrap();

    let err = service
      .apply_period_change(record.id, upsert(d(2005, 1, 1), d(2012, 12, 31)))
      .await
      .unwrap_err();
    let ServiceError::Domain(Error::Normalization(conflicts)) = err else {
      panic!("expected a normalization error, got {err:?}");
    };
    assert_eq!(conflicts.conflicts[0].kind, ConflictKind::Overlap);

    let after = service.store().get(record.id).await.unwrap().unwrap();
    assert_eq!(after.periods, before.periods);
  }

  #[tokio::test]
  async fn unknown_person_is_not_yet_assessed() {
    let service = service_for(&[]);
    let assessment = service.compute_for_person(Uuid::new_v4(), IDENT).await.unwrap();
    assert!(matches!(assessment, Assessment::NotYetAssessed(None)));
  }

  #[tokio::test]
  async fn empty_record_is_not_yet_assessed() {
    let case_id = Uuid::new_v4();
    let service = service_for(&[case_id]);
    service.create(case_id, IDENT).await.unwrap();
    let assessment = service.compute_for_person(case_id, IDENT).await.unwrap();
    assert!(matches!(assessment, Assessment::NotYetAssessed(Some(_))));
  }

  #[tokio::test]
  async fn newer_fact_version_triggers_recompute() {
    let case_id = Uuid::new_v4();
    let grunnlag = StaticGrunnlag::new();
    grunnlag.put(case_id, facts(1)).unwrap();
    let service = TrygdetidService::new(MemoryStore::new(), grunnlag.clone());

    let record = service.create(case_id, IDENT).await.unwrap();
    let open = NewPeriod::new(PeriodKind::Actual, "NOR", d(2000, 1, 1), None);
    service
      .apply_period_change(record.id, PeriodChange::Upsert(open))
      .await
      .unwrap();

    let mut newer = facts(2);
    newer.deathdate = Some(d(2023, 1, 1));
    grunnlag.put(case_id, newer).unwrap();

    let Assessment::Assessed(record) =
      service.compute_for_person(case_id, IDENT).await.unwrap()
    else {
      panic!("expected an assessed record");
    };
    assert_eq!(record.facts.version, 2);
    assert_eq!(record.effective_total(), Some(23));
  }

  #[tokio::test]
  async fn overrides_and_flags_round_trip_through_store() {
    let case_id = Uuid::new_v4();
    let service = service_for(&[case_id]);
    let record = service.create(case_id, IDENT).await.unwrap();

    let r = service.set_point_year_override(record.id, Some(10)).await.unwrap();
    assert_eq!(r.effective_total(), Some(10));

    let r = service.override_occupational_injury(record.id, true).await.unwrap();
    assert_eq!(r.effective_total(), Some(40));

    let r = service.set_nordic_convention(record.id, true).await.unwrap();
    assert!(r.nordic_convention);

    let r = service
      .override_total(record.id, ResultOverride::new(25))
      .await
      .unwrap();
    assert_eq!(r.effective_total(), Some(25));

    let stored = service.store().get(record.id).await.unwrap().unwrap();
    assert_eq!(stored, r);
  }

  #[tokio::test]
  async fn missing_record_is_reported() {
    let service = service_for(&[]);
    let id = Uuid::new_v4();
    let err = service.override_occupational_injury(id, true).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(Error::RecordNotFound(x)) if x == id));
  }

  #[tokio::test]
  async fn automatic_regulering_without_prior_basis_fails_but_manual_succeeds() {
    let prior_case = Uuid::new_v4();
    let new_case = Uuid::new_v4();
    let service = service_for(&[prior_case, new_case]);
    service.create(prior_case, IDENT).await.unwrap();

    let automatic = RevisionContext {
      cause:   RevisionCause::Regulering,
      process: ProcessType::Automatic,
    };
    let err = service
      .copy_from_prior_revision(new_case, prior_case, IDENT, automatic)
      .await
      .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(Error::MissingPriorData { .. })));
    assert!(service.store().find(new_case, IDENT).await.unwrap().is_none());

    let manual = RevisionContext {
      cause:   RevisionCause::Regulering,
      process: ProcessType::Manual,
    };
    let copy = service
      .copy_from_prior_revision(new_case, prior_case, IDENT, manual)
      .await
      .unwrap();
    assert!(copy.periods.is_empty());
    assert_eq!(copy.case_id, new_case);
  }

  #[tokio::test]
  async fn revision_copies_periods() {
    let prior_case = Uuid::new_v4();
    let new_case = Uuid::new_v4();
    let service = service_for(&[prior_case, new_case]);
    let prior = service.create(prior_case, IDENT).await.unwrap();
    service
      .apply_period_change(prior.id, upsert(d(2000, 1, 1), d(2014, 12, 31)))
      .await
      .unwrap();

    let context = RevisionContext {
      cause:   RevisionCause::Regulering,
      process: ProcessType::Automatic,
    };
    let copy = service
      .copy_from_prior_revision(new_case, prior_case, IDENT, context)
      .await
      .unwrap();
    assert_eq!(copy.effective_total(), Some(15));
    assert_eq!(service.list_for_case(new_case).await.unwrap().len(), 1);

    assert_eq!(service.delete_case(prior_case).await.unwrap(), 1);
    assert!(service.store().get(copy.id).await.unwrap().is_some());
  }
}
