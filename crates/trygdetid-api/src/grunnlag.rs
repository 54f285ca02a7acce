//! HTTP client for the external fact ("grunnlag") service.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use trygdetid_core::grunnlag::{GrunnlagSource, PersonFacts};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GrunnlagError {
  #[error("request to fact source failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("GET {url} → {status}")]
  Status { url: String, status: StatusCode },
}

/// Fetches person facts from `GET {base_url}/behandlinger/{case}/personer/{ident}`.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpGrunnlagSource {
  client:   Client,
  base_url: String,
}

impl HttpGrunnlagSource {
  pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GrunnlagError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, case_id: Uuid, ident: &str) -> String {
    format!(
      "{}/behandlinger/{case_id}/personer/{ident}",
      self.base_url.trim_end_matches('/'),
    )
  }
}

impl GrunnlagSource for HttpGrunnlagSource {
  type Error = GrunnlagError;

  async fn person_facts(
    &self,
    case_id: Uuid,
    ident: &str,
  ) -> Result<Option<PersonFacts>, GrunnlagError> {
    let url = self.url(case_id, ident);
    let resp = self.client.get(&url).send().await?;

    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      status if status.is_success() => Ok(Some(resp.json().await?)),
      status => Err(GrunnlagError::Status { url, status }),
    }
  }
}
