use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque pagination token; passed back verbatim as `until`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
  Number(i64),
  Text(String),
}

impl fmt::Display for Cursor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Cursor::Number(n) => write!(f, "{}", n),
      Cursor::Text(s) => f.write_str(s),
    }
  }
}

impl From<i64> for Cursor {
  fn from(n: i64) -> Self {
    Cursor::Number(n)
  }
}

impl From<&str> for Cursor {
  fn from(s: &str) -> Self {
    Cursor::Text(s.to_string())
  }
}

/// Pagination block returned alongside every list page.
///
/// `next` is present if and only if another page exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
  #[serde(default)]
  pub count: u64,
  #[serde(default)]
  pub next: Option<Cursor>,
  #[serde(default)]
  pub prev: Option<Cursor>,
}

/// One page of a list operation, in server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub pagination: Pagination,
}

impl<T> Page<T> {
  pub fn has_next(&self) -> bool {
    self.pagination.next.is_some()
  }
}

/// Parameters accepted by every list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
  /// Requested page size
  pub limit: u32,
  /// Cursor from the previous page's `pagination.next`
  pub until: Option<Cursor>,
  /// Extra scope filters, e.g. `projectId` for deployments
  pub filters: BTreeMap<String, String>,
}

/// Query names owned by pagination and tenant scoping. Filters cannot use them.
pub const RESERVED_QUERY_NAMES: [&str; 3] = ["limit", "until", "teamId"];

impl Default for ListParams {
  fn default() -> Self {
    Self {
      limit: 20,
      until: None,
      filters: BTreeMap::new(),
    }
  }
}

impl ListParams {
  pub fn new(limit: u32) -> Self {
    Self {
      limit,
      ..Self::default()
    }
  }

  pub fn until(mut self, cursor: impl Into<Option<Cursor>>) -> Self {
    self.until = cursor.into();
    self
  }

  /// Add a scope filter. Names in [`RESERVED_QUERY_NAMES`] are ignored;
  /// use `new`, `until` and the client's credentials for those.
  pub fn filter(mut self, name: &str, value: impl Into<String>) -> Self {
    if RESERVED_QUERY_NAMES.contains(&name) {
      tracing::warn!(name, "ignoring list filter with a reserved name");
      return self;
    }
    self.filters.insert(name.to_string(), value.into());
    self
  }

  /// Query pairs in a stable order. Does not include the tenant scope.
  pub fn query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = vec![("limit".to_string(), self.limit.to_string())];
    if let Some(until) = &self.until {
      pairs.push(("until".to_string(), until.to_string()));
    }
    pairs.extend(
      self
        .filters
        .iter()
        .filter(|(k, _)| !RESERVED_QUERY_NAMES.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone())),
    );
    pairs
  }
}

/// The authenticated account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub email: String,
  #[serde(default)]
  pub name: Option<String>,
  pub username: String,
  #[serde(default)]
  pub default_team_id: Option<String>,
}

/// Team (tenant scope)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
  pub id: String,
  pub slug: String,
  #[serde(default)]
  pub name: Option<String>,
}

/// Project summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub framework: Option<String>,
  #[serde(default)]
  pub node_version: Option<String>,
  #[serde(default)]
  pub created_at: Option<i64>,
  #[serde(default)]
  pub updated_at: Option<i64>,
}

/// Fields accepted by a project PATCH. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub framework: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_command: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output_directory: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub root_directory: Option<String>,
}

impl ProjectUpdate {
  pub fn is_empty(&self) -> bool {
    self == &Self::default()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
  Building,
  Error,
  Initializing,
  Queued,
  Ready,
  Canceled,
  #[serde(other)]
  Unknown,
}

impl fmt::Display for DeploymentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      DeploymentState::Building => "building",
      DeploymentState::Error => "error",
      DeploymentState::Initializing => "initializing",
      DeploymentState::Queued => "queued",
      DeploymentState::Ready => "ready",
      DeploymentState::Canceled => "canceled",
      DeploymentState::Unknown => "unknown",
    };
    f.write_str(s)
  }
}

/// Deployment summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
  pub uid: String,
  pub name: String,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub state: Option<DeploymentState>,
  /// Epoch milliseconds
  #[serde(default)]
  pub created: Option<i64>,
  #[serde(default)]
  pub target: Option<String>,
}

/// Domain registered to the account or team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
  #[serde(default)]
  pub id: Option<String>,
  pub name: String,
  #[serde(default)]
  pub verified: bool,
  #[serde(default)]
  pub created_at: Option<i64>,
  #[serde(default)]
  pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvTarget {
  Production,
  Preview,
  Development,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvVarType {
  System,
  Secret,
  #[default]
  Encrypted,
  Plain,
  Sensitive,
}

/// Environment variable on a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
  #[serde(default)]
  pub id: Option<String>,
  pub key: String,
  /// Absent for sensitive or encrypted values
  #[serde(default)]
  pub value: Option<String>,
  #[serde(default, rename = "type")]
  pub kind: EnvVarType,
  #[serde(default)]
  pub target: Vec<EnvTarget>,
}

/// Payload for creating an environment variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEnvVar {
  pub key: String,
  pub value: String,
  #[serde(rename = "type")]
  pub kind: EnvVarType,
  pub target: Vec<EnvTarget>,
}

impl NewEnvVar {
  /// Reject payloads the server would refuse anyway.
  pub fn validate(&self) -> Result<(), String> {
    if self.key.trim().is_empty() {
      return Err("environment variable key must not be empty".to_string());
    }
    if self.target.is_empty() {
      return Err("at least one target environment is required".to_string());
    }
    Ok(())
  }
}

/// Acknowledgment returned by delete/cancel style mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
  #[serde(default)]
  pub uid: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cursor_accepts_number_or_string() {
    let p: Pagination =
      serde_json::from_str(r#"{"count":20,"next":1700000000,"prev":"abc"}"#).unwrap();
    assert_eq!(p.next, Some(Cursor::Number(1_700_000_000)));
    assert_eq!(p.prev, Some(Cursor::Text("abc".into())));
    assert_eq!(p.next.unwrap().to_string(), "1700000000");
  }

  #[test]
  fn test_filters_cannot_shadow_reserved_names() {
    let mut params = ListParams::new(20)
      .filter("teamId", "team_2")
      .filter("limit", "5");
    params.filters.insert("until".into(), "1".into());
    assert_eq!(
      params.query_pairs(),
      vec![("limit".to_string(), "20".to_string())]
    );
  }

  #[test]
  fn test_null_next_means_last_page() {
    let p: Pagination = serde_json::from_str(r#"{"count":3,"next":null,"prev":null}"#).unwrap();
    assert!(p.next.is_none());
  }

  #[test]
  fn test_list_params_query_pairs() {
    let params = ListParams::new(50)
      .until(Cursor::Number(42))
      .filter("projectId", "prj_1");
    assert_eq!(
      params.query_pairs(),
      vec![
        ("limit".to_string(), "50".to_string()),
        ("until".to_string(), "42".to_string()),
        ("projectId".to_string(), "prj_1".to_string()),
      ]
    );
  }

  #[test]
  fn test_new_env_var_validation() {
    let mut var = NewEnvVar {
      key: "API_URL".into(),
      value: "https://example.com".into(),
      kind: EnvVarType::Plain,
      target: vec![],
    };
    assert!(var.validate().is_err());
    var.target.push(EnvTarget::Production);
    assert!(var.validate().is_ok());
    var.key = "  ".into();
    assert!(var.validate().is_err());
  }

  #[test]
  fn test_project_update_skips_unset_fields() {
    let update = ProjectUpdate {
      framework: Some("nextjs".into()),
      ..Default::default()
    };
    assert_eq!(
      serde_json::to_value(&update).unwrap(),
      serde_json::json!({ "framework": "nextjs" })
    );
    assert!(ProjectUpdate::default().is_empty());
  }
}
