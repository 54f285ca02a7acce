//! Scalar facts about a person, supplied by the external fact source.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A read-only, versioned snapshot of the facts the engine needs for one
/// person in one case.
///
/// `version` increases monotonically; a record computed from an older version
/// is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFacts {
  /// National identity number ("fødselsnummer").
  pub ident:     String,
  pub birthdate: Option<NaiveDate>,
  /// Absent until a death is registered.
  pub deathdate: Option<NaiveDate>,
  pub version:   u64,
}

impl PersonFacts {
  pub fn new(ident: impl Into<String>) -> Self {
    Self { ident: ident.into(), birthdate: None, deathdate: None, version: 0 }
  }
}

/// Abstraction over the external fact ("grunnlag") source.
pub trait GrunnlagSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The current snapshot for `ident` in `case_id`, or `None` if the source
  /// knows nothing about the person.
  fn person_facts<'a>(
    &'a self,
    case_id: Uuid,
    ident: &'a str,
  ) -> impl Future<Output = Result<Option<PersonFacts>, Self::Error>> + Send + 'a;
}
