//! In-memory implementations of [`TrygdetidStore`] and [`GrunnlagSource`].
//!
//! Used by tests across the workspace. Cloning is cheap and clones share
//! state, so a test can keep a handle while the service owns another.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;
use uuid::Uuid;

use crate::{
  grunnlag::{GrunnlagSource, PersonFacts},
  record::InsuranceTimeRecord,
  store::TrygdetidStore,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("trygdetid already exists for person {ident} in case {case_id}")]
  Duplicate { case_id: Uuid, ident: String },

  #[error("trygdetid not found: {0}")]
  NotFound(Uuid),

  #[error("lock poisoned")]
  Poisoned,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, MemoryError> {
  mutex.lock().map_err(|_| MemoryError::Poisoned)
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  records: Arc<Mutex<HashMap<Uuid, InsuranceTimeRecord>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }
}

impl TrygdetidStore for MemoryStore {
  type Error = MemoryError;

  async fn insert(&self, record: InsuranceTimeRecord) -> Result<(), MemoryError> {
    let mut records = lock(&self.records)?;
    if records
      .values()
      .any(|r| r.case_id == record.case_id && r.ident == record.ident)
    {
      return Err(MemoryError::Duplicate {
        case_id: record.case_id,
        ident:   record.ident,
      });
    }
    records.insert(record.id, record);
    Ok(())
  }

  async fn update(&self, record: InsuranceTimeRecord) -> Result<(), MemoryError> {
    let mut records = lock(&self.records)?;
    match records.get_mut(&record.id) {
      Some(slot) => {
        *slot = record;
        Ok(())
      }
      None => Err(MemoryError::NotFound(record.id)),
    }
  }

  async fn get(&self, id: Uuid) -> Result<Option<InsuranceTimeRecord>, MemoryError> {
    Ok(lock(&self.records)?.get(&id).cloned())
  }

  async fn find(
    &self,
    case_id: Uuid,
    ident: &str,
  ) -> Result<Option<InsuranceTimeRecord>, MemoryError> {
    Ok(
      lock(&self.records)?
        .values()
        .find(|r| r.case_id == case_id && r.ident == ident)
        .cloned(),
    )
  }

  async fn list_for_case(
    &self,
    case_id: Uuid,
  ) -> Result<Vec<InsuranceTimeRecord>, MemoryError> {
    let mut found: Vec<InsuranceTimeRecord> = lock(&self.records)?
      .values()
      .filter(|r| r.case_id == case_id)
      .cloned()
      .collect();
    found.sort_by_key(|r| r.created_at);
    Ok(found)
  }

  async fn delete_case(&self, case_id: Uuid) -> Result<usize, MemoryError> {
    let mut records = lock(&self.records)?;
    let before = records.len();
    records.retain(|_, r| r.case_id != case_id);
    Ok(before - records.len())
  }
}

// ─── Fact source ─────────────────────────────────────────────────────────────

/// A fact source that serves whatever snapshots it was given.
#[derive(Debug, Clone, Default)]
pub struct StaticGrunnlag {
  facts: Arc<Mutex<HashMap<(Uuid, String), PersonFacts>>>,
}

impl StaticGrunnlag {
  pub fn new() -> Self { Self::default() }

  /// Register (or replace) the snapshot for a person in a case.
  pub fn put(&self, case_id: Uuid, facts: PersonFacts) -> Result<(), MemoryError> {
    lock(&self.facts)?.insert((case_id, facts.ident.clone()), facts);
    Ok(())
  }
}

impl GrunnlagSource for StaticGrunnlag {
  type Error = MemoryError;

  async fn person_facts(
    &self,
    case_id: Uuid,
    ident: &str,
  ) -> Result<Option<PersonFacts>, MemoryError> {
    Ok(lock(&self.facts)?.get(&(case_id, ident.to_owned())).cloned())
  }
}
