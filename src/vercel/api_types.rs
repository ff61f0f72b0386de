//! Serde-deserializable types matching Vercel API responses.
//!
//! These types are separate from domain types so that endpoint quirks
//! (duplicate `state`/`readyState` fields, `id` vs `uid`) stay out of the
//! shapes we cache.

use serde::Deserialize;

use super::error::ApiErrorDetail;
use super::types::{DeleteAck, Deployment, DeploymentState, Domain, Page, Pagination, User};

// ============================================================================
// Envelopes
// ============================================================================

/// List response. The item array is named after the resource.
#[derive(Debug, Deserialize)]
pub struct ApiPage<T> {
  #[serde(
    alias = "projects",
    alias = "deployments",
    alias = "domains",
    alias = "teams",
    alias = "envs"
  )]
  pub items: Vec<T>,
  #[serde(default)]
  pub pagination: Option<Pagination>,
}

impl<T> ApiPage<T> {
  /// Convert to a domain page. A missing pagination block means a single,
  /// final page.
  pub fn into_page<U>(self, convert: impl FnMut(T) -> U) -> Page<U> {
    let items: Vec<U> = self.items.into_iter().map(convert).collect();
    let pagination = self.pagination.unwrap_or_else(|| Pagination {
      count: items.len() as u64,
      next: None,
      prev: None,
    });
    Page { items, pagination }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiUserResponse {
  pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ApiDomainResponse {
  pub domain: Domain,
}

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub error: Option<ApiErrorInner>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorInner {
  #[serde(default)]
  pub code: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
}

impl ApiErrorBody {
  /// Build the error detail from a raw body, falling back to the status
  /// reason and the raw text when the body is not the documented shape.
  pub fn detail_from(body: &str, fallback_code: &str) -> ApiErrorDetail {
    let inner = serde_json::from_str::<ApiErrorBody>(body)
      .ok()
      .and_then(|b| b.error)
      .unwrap_or_default();

    let message = inner.message.unwrap_or_else(|| {
      let trimmed = body.trim();
      if trimmed.is_empty() {
        fallback_code.to_string()
      } else {
        trimmed.to_string()
      }
    });

    ApiErrorDetail::new(inner.code.unwrap_or_else(|| fallback_code.to_string()), message)
  }
}

// ============================================================================
// Deployments
// ============================================================================

/// Deployment as returned by either the list (v6) or single (v13) endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeployment {
  #[serde(default)]
  pub uid: Option<String>,
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub state: Option<DeploymentState>,
  #[serde(default)]
  pub ready_state: Option<DeploymentState>,
  #[serde(default)]
  pub created: Option<i64>,
  #[serde(default)]
  pub created_at: Option<i64>,
  #[serde(default)]
  pub target: Option<String>,
}

impl From<ApiDeployment> for Deployment {
  fn from(d: ApiDeployment) -> Self {
    Deployment {
      uid: d.uid.or(d.id).unwrap_or_default(),
      name: d.name,
      url: d.url,
      state: d.state.or(d.ready_state),
      created: d.created.or(d.created_at),
      target: d.target,
    }
  }
}

// ============================================================================
// Mutation acknowledgments
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiAck {
  #[serde(default)]
  pub uid: Option<String>,
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
}

impl From<ApiAck> for DeleteAck {
  fn from(a: ApiAck) -> Self {
    DeleteAck {
      uid: a.uid.or(a.id),
      state: a.state,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vercel::types::{Cursor, Project};

  #[test]
  fn test_page_items_alias() {
    let page: ApiPage<Project> = serde_json::from_str(
      r#"{"projects":[{"id":"prj_1","name":"web"}],"pagination":{"count":1,"next":1700000000,"prev":null}}"#,
    )
    .unwrap();
    let page = page.into_page(|p| p);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.pagination.next, Some(Cursor::Number(1_700_000_000)));
  }

  #[test]
  fn test_missing_pagination_is_final_page() {
    let page: ApiPage<serde_json::Value> = serde_json::from_str(r#"{"envs":[{},{}]}"#).unwrap();
    let page = page.into_page(|v| v);
    assert_eq!(page.pagination.count, 2);
    assert!(!page.has_next());
  }

  #[test]
  fn test_list_deployment_with_duplicate_fields() {
    let d: ApiDeployment = serde_json::from_str(
      r#"{"uid":"dpl_1","name":"web","state":"READY","readyState":"READY","created":1,"createdAt":2}"#,
    )
    .unwrap();
    let d = Deployment::from(d);
    assert_eq!(d.uid, "dpl_1");
    assert_eq!(d.state, Some(DeploymentState::Ready));
    assert_eq!(d.created, Some(1));
  }

  #[test]
  fn test_single_deployment_shape() {
    let d: ApiDeployment = serde_json::from_str(
      r#"{"id":"dpl_2","name":"web","readyState":"BUILDING","createdAt":1700000000000}"#,
    )
    .unwrap();
    let d = Deployment::from(d);
    assert_eq!(d.uid, "dpl_2");
    assert_eq!(d.state, Some(DeploymentState::Building));
    assert_eq!(d.created, Some(1_700_000_000_000));
  }

  #[test]
  fn test_unknown_deployment_state() {
    let d: ApiDeployment =
      serde_json::from_str(r#"{"uid":"dpl_1","name":"web","state":"DELETED"}"#).unwrap();
    assert_eq!(d.state, Some(DeploymentState::Unknown));
  }

  #[test]
  fn test_error_detail_documented_shape() {
    let detail = ApiErrorBody::detail_from(
      r#"{"error":{"code":"forbidden","message":"Not authorized"}}"#,
      "Forbidden",
    );
    assert_eq!(detail, ApiErrorDetail::new("forbidden", "Not authorized"));
  }

  #[test]
  fn test_error_detail_fallbacks() {
    let detail = ApiErrorBody::detail_from("upstream timeout", "Bad Gateway");
    assert_eq!(detail, ApiErrorDetail::new("Bad Gateway", "upstream timeout"));

    let detail = ApiErrorBody::detail_from("", "Not Found");
    assert_eq!(detail, ApiErrorDetail::new("Not Found", "Not Found"));
  }
}
