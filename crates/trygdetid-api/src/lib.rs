//! JSON REST API for trygdetid.
//!
//! Exposes an axum [`Router`] backed by a [`TrygdetidService`] over any
//! [`TrygdetidStore`] and [`GrunnlagSource`]. Auth and TLS are the caller's
//! responsibility.

pub mod error;
pub mod grunnlag;
pub mod overrides;
pub mod periods;
pub mod records;
pub mod revision;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use trygdetid_core::{
  grunnlag::GrunnlagSource,
  service::TrygdetidService,
  store::TrygdetidStore,
};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_grunnlag_timeout_secs() -> u64 { 30 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `TRYGDETID_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  /// Base URL of the fact service.
  pub grunnlag_url:          String,
  #[serde(default = "default_grunnlag_timeout_secs")]
  pub grunnlag_timeout_secs: u64,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `service`.
pub fn router<S, G>(service: Arc<TrygdetidService<S, G>>) -> Router
where
  S: TrygdetidStore + 'static,
  G: GrunnlagSource + 'static,
{
  Router::new()
    // Per case
    .route(
      "/behandlinger/{case_id}/trygdetid",
      get(records::list::<S, G>)
        .post(records::create::<S, G>)
        .delete(records::delete_case::<S, G>),
    )
    .route(
      "/behandlinger/{case_id}/trygdetid/kopier",
      post(revision::copy::<S, G>),
    )
    .route(
      "/behandlinger/{case_id}/trygdetid/{ident}",
      get(records::for_person::<S, G>),
    )
    // Per record
    .route("/trygdetid/{id}/perioder", post(periods::upsert::<S, G>))
    .route(
      "/trygdetid/{id}/perioder/{period_id}",
      delete(periods::remove::<S, G>),
    )
    .route("/trygdetid/{id}/overstyr", post(overrides::total::<S, G>))
    .route(
      "/trygdetid/{id}/yrkesskade",
      post(overrides::occupational_injury::<S, G>),
    )
    .route("/trygdetid/{id}/poengaar", post(overrides::point_years::<S, G>))
    .route(
      "/trygdetid/{id}/nordisk-konvensjon",
      post(overrides::nordic_convention::<S, G>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::NaiveDate;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use trygdetid_core::{
    grunnlag::PersonFacts,
    memory::{MemoryStore, StaticGrunnlag},
  };
  use uuid::Uuid;

  use super::*;

  const IDENT: &str = "01016012345";

  struct Harness {
    app:      Router,
    grunnlag: StaticGrunnlag,
  }

  fn harness() -> Harness {
    let grunnlag = StaticGrunnlag::new();
    let service = TrygdetidService::new(MemoryStore::new(), grunnlag.clone());
    Harness { app: router(Arc::new(service)), grunnlag }
  }

  impl Harness {
    fn known_case(&self) -> Uuid {
      let case_id = Uuid::new_v4();
      let facts = PersonFacts {
        ident:     IDENT.into(),
        birthdate: NaiveDate::from_ymd_opt(1960, 1, 1),
        deathdate: NaiveDate::from_ymd_opt(2020, 1, 1),
        version:   1,
      };
      self.grunnlag.put(case_id, facts).unwrap();
      case_id
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
      let mut builder = Request::builder().method(method).uri(uri);
      let body = match body {
        Some(json) => {
          builder = builder.header(header::CONTENT_TYPE, "application/json");
          Body::from(json.to_string())
        }
        None => Body::empty(),
      };
      let resp = self
        .app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
      let status = resp.status();
      let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
      let value = if bytes.is_empty() {
        Value::Null
      } else {
        serde_json::from_slice(&bytes).unwrap()
      };
      (status, value)
    }

    async fn create(&self, case_id: Uuid) -> String {
      let (status, body) = self
        .send(
          "POST",
          &format!("/behandlinger/{case_id}/trygdetid"),
          Some(json!({ "ident": IDENT })),
        )
        .await;
      assert_eq!(status, StatusCode::CREATED, "{body}");
      body["id"].as_str().unwrap().to_owned()
    }
  }

  fn period(from: &str, to: &str) -> Value {
    json!({ "kind": "actual", "country": "NOR", "from": from, "to": to })
  }

  // ── Records ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_fetch_unassessed() {
    let h = harness();
    let case_id = h.known_case();
    h.create(case_id).await;

    let (status, body) = h
      .send("GET", &format!("/behandlinger/{case_id}/trygdetid/{IDENT}"), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_yet_assessed");
    assert_eq!(body["trygdetid"]["state"]["state"], "unassessed");
  }

  #[tokio::test]
  async fn unknown_person_is_not_yet_assessed() {
    let h = harness();
    let (status, body) = h
      .send("GET", &format!("/behandlinger/{}/trygdetid/{IDENT}", Uuid::new_v4()), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_yet_assessed");
    assert!(body["trygdetid"].is_null());
  }

  #[tokio::test]
  async fn duplicate_create_is_conflict() {
    let h = harness();
    let case_id = h.known_case();
    h.create(case_id).await;
    let (status, _) = h
      .send(
        "POST",
        &format!("/behandlinger/{case_id}/trygdetid"),
        Some(json!({ "ident": IDENT })),
      )
      .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn create_without_facts_is_unprocessable() {
    let h = harness();
    let (status, _) = h
      .send(
        "POST",
        &format!("/behandlinger/{}/trygdetid", Uuid::new_v4()),
        Some(json!({ "ident": IDENT })),
      )
      .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  // ── Periods ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn periods_drive_the_figure() {
    let h = harness();
    let case_id = h.known_case();
    let id = h.create(case_id).await;

    let (status, body) = h
      .send("POST", &format!("/trygdetid/{id}/perioder"), Some(period("2000-01-01", "2009-12-31")))
      .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["effective_total"], 10);

    let (_, body) = h
      .send("POST", &format!("/trygdetid/{id}/perioder"), Some(period("2012-01-01", "2013-12-31")))
      .await;
    assert_eq!(body["effective_total"], 12);
    assert_eq!(body["coverage_gaps"].as_array().unwrap().len(), 1);

    let (status, body) = h
      .send("GET", &format!("/behandlinger/{case_id}/trygdetid/{IDENT}"), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "assessed");
    assert_eq!(body["trygdetid"]["periods"].as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn overlapping_period_is_conflict_with_details() {
    let h = harness();
    let case_id = h.known_case();
    let id = h.create(case_id).await;
    h.send("POST", &format!("/trygdetid/{id}/perioder"), Some(period("2000-01-01", "2009-12-31")))
      .await;

    let (status, body) = h
      .send("POST", &format!("/trygdetid/{id}/perioder"), Some(period("2005-01-01", "2012-12-31")))
      .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflicts"][0]["kind"], "OVERLAP");

    let (_, body) = h
      .send("GET", &format!("/behandlinger/{case_id}/trygdetid/{IDENT}"), None)
      .await;
    assert_eq!(body["trygdetid"]["periods"].as_array().unwrap().len(), 1);
    assert_eq!(body["trygdetid"]["effective_total"], 10);
  }

  #[tokio::test]
  async fn inverted_period_is_bad_request() {
    let h = harness();
    let case_id = h.known_case();
    let id = h.create(case_id).await;
    let (status, _) = h
      .send("POST", &format!("/trygdetid/{id}/perioder"), Some(period("2010-01-01", "2009-12-31")))
      .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn remove_period_and_unknown_period() {
    let h = harness();
    let case_id = h.known_case();
    let id = h.create(case_id).await;
    let (_, body) = h
      .send("POST", &format!("/trygdetid/{id}/perioder"), Some(period("2000-01-01", "2009-12-31")))
      .await;
    let period_id = body["periods"][0]["id"].as_str().unwrap().to_owned();

    let (status, body) = h
      .send("DELETE", &format!("/trygdetid/{id}/perioder/{period_id}"), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["effective_total"].is_null());

    let (status, _) = h
      .send("DELETE", &format!("/trygdetid/{id}/perioder/{period_id}"), None)
      .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Overrides ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn manual_inputs() {
    let h = harness();
    let case_id = h.known_case();
    let id = h.create(case_id).await;

    let (_, body) = h
      .send("POST", &format!("/trygdetid/{id}/poengaar"), Some(json!({ "years": 12 })))
      .await;
    assert_eq!(body["effective_total"], 12);

    let (_, body) = h
      .send("POST", &format!("/trygdetid/{id}/yrkesskade"), Some(json!({ "enabled": true })))
      .await;
    assert_eq!(body["effective_total"], 40);

    let (_, body) = h
      .send("POST", &format!("/trygdetid/{id}/nordisk-konvensjon"), Some(json!({ "enabled": true })))
      .await;
    assert_eq!(body["nordic_convention"], true);

    let (status, body) = h
      .send(
        "POST",
        &format!("/trygdetid/{id}/overstyr"),
        Some(json!({ "total_norway": 27, "justification": "Vedtak" })),
      )
      .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["effective_total"], 27);
    assert_eq!(body["state"]["state"], "overridden");

    let (status, _) = h
      .send("POST", &format!("/trygdetid/{id}/overstyr"), Some(json!({ "total_norway": 41 })))
      .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unknown_record_is_not_found() {
    let h = harness();
    let (status, _) = h
      .send(
        "POST",
        &format!("/trygdetid/{}/yrkesskade", Uuid::new_v4()),
        Some(json!({ "enabled": true })),
      )
      .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Revisions ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn automatic_regulering_without_basis_is_unprocessable() {
    let h = harness();
    let prior = h.known_case();
    let new_case = h.known_case();
    h.create(prior).await;

    let body = json!({
      "prior_case_id": prior,
      "ident": IDENT,
      "cause": "regulering",
      "process": "automatic",
    });
    let (status, _) = h
      .send("POST", &format!("/behandlinger/{new_case}/trygdetid/kopier"), Some(body))
      .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn copy_then_delete_case() {
    let h = harness();
    let prior = h.known_case();
    let new_case = h.known_case();
    let id = h.create(prior).await;
    h.send("POST", &format!("/trygdetid/{id}/perioder"), Some(period("2000-01-01", "2004-12-31")))
      .await;

    let body = json!({
      "prior_case_id": prior,
      "ident": IDENT,
      "cause": "new_information",
      "process": "manual",
    });
    let (status, copy) = h
      .send("POST", &format!("/behandlinger/{new_case}/trygdetid/kopier"), Some(body))
      .await;
    assert_eq!(status, StatusCode::CREATED, "{copy}");
    assert_eq!(copy["effective_total"], 5);
    assert_ne!(copy["id"].as_str(), Some(id.as_str()));

    let (_, listed) = h
      .send("GET", &format!("/behandlinger/{new_case}/trygdetid"), None)
      .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, body) = h
      .send("DELETE", &format!("/behandlinger/{new_case}/trygdetid"), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, listed) = h
      .send("GET", &format!("/behandlinger/{new_case}/trygdetid"), None)
      .await;
    assert!(listed.as_array().unwrap().is_empty());
  }
}
