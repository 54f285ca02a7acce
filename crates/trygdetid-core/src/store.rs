//! The `TrygdetidStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `trygdetid-store-sqlite`, or [`crate::memory::MemoryStore`] in tests).
//! The service layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::record::InsuranceTimeRecord;

/// Persistence for insurance-time records.
///
/// Records are written whole: every mutation replaces the full record, period
/// set included. Concurrent writers resolve as last-write-wins.
pub trait TrygdetidStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new record. Returns an error if a record already exists for
  /// the same `(case_id, ident)` pair.
  fn insert(
    &self,
    record: InsuranceTimeRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Replace a stored record and its periods.
  fn update(
    &self,
    record: InsuranceTimeRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<InsuranceTimeRecord>, Self::Error>>
  + Send
  + '_;

  /// Retrieve the record for one person in one case.
  fn find<'a>(
    &'a self,
    case_id: Uuid,
    ident: &'a str,
  ) -> impl Future<Output = Result<Option<InsuranceTimeRecord>, Self::Error>>
  + Send
  + 'a;

  /// All records belonging to a case, oldest first.
  fn list_for_case(
    &self,
    case_id: Uuid,
  ) -> impl Future<Output = Result<Vec<InsuranceTimeRecord>, Self::Error>>
  + Send
  + '_;

  /// Delete every record of a case; returns how many were removed.
  fn delete_case(
    &self,
    case_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
