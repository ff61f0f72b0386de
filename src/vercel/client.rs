use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::diagnostics::{default_sink, Diagnostic, DiagnosticSink};
use crate::vercel::api_types::{
  ApiAck, ApiDeployment, ApiDomainResponse, ApiErrorBody, ApiPage, ApiUserResponse,
};
use crate::vercel::error::ClientError;
use crate::vercel::types::{
  DeleteAck, Deployment, Domain, EnvVar, ListParams, NewEnvVar, Page, Project, ProjectUpdate,
  Team, User,
};

pub const DEFAULT_API_URL: &str = "https://api.vercel.com";

/// Bearer token plus optional team scope, as handed over by the credential store.
#[derive(Clone)]
pub struct Credentials {
  token: String,
  team_id: Option<String>,
}

impl Credentials {
  pub fn new(token: impl Into<String>, team_id: Option<String>) -> Self {
    Self {
      token: token.into(),
      team_id: team_id.filter(|t| !t.is_empty()),
    }
  }

  pub fn team_id(&self) -> Option<&str> {
    self.team_id.as_deref()
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("token", &"<redacted>")
      .field("team_id", &self.team_id)
      .finish()
  }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
  pub base_url: String,
  pub timeout: Duration,
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_API_URL.to_string(),
      timeout: Duration::from_secs(30),
    }
  }
}

/// Vercel REST client.
///
/// Every request carries the bearer token and, when the credentials name a
/// team, a `teamId` query parameter. List operations share one pagination
/// contract: `limit` plus optional `until` in, `{ items, pagination }` out.
#[derive(Clone)]
pub struct ResourceClient {
  http: reqwest::Client,
  base_url: Url,
  credentials: Credentials,
  sink: Arc<dyn DiagnosticSink>,
}

impl ResourceClient {
  pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self, ClientError> {
    let base_url = Url::parse(&options.base_url)
      .map_err(|e| ClientError::Transport(format!("invalid API url {}: {}", options.base_url, e)))?;
    if base_url.cannot_be_a_base() {
      return Err(ClientError::Transport(format!(
        "invalid API url {}",
        options.base_url
      )));
    }

    let http = reqwest::Client::builder()
      .timeout(options.timeout)
      .user_agent(concat!("v9s/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self {
      http,
      base_url,
      credentials,
      sink: default_sink(),
    })
  }

  pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
    self.sink = sink;
    self
  }

  /// Team scope attached to every request, if any.
  pub fn team_id(&self) -> Option<&str> {
    self.credentials.team_id()
  }

  // ==========================================================================
  // Account
  // ==========================================================================

  /// Get the authenticated user
  pub async fn get_user(&self) -> Result<User, ClientError> {
    let response: ApiUserResponse = self.get_json(&["v2", "user"], &[]).await?;
    Ok(response.user)
  }

  /// List teams the user belongs to
  pub async fn list_teams(&self, params: &ListParams) -> Result<Page<Team>, ClientError> {
    self.list(&["v2", "teams"], params, |t: Team| t).await
  }

  // ==========================================================================
  // Projects
  // ==========================================================================

  pub async fn list_projects(&self, params: &ListParams) -> Result<Page<Project>, ClientError> {
    self.list(&["v9", "projects"], params, |p: Project| p).await
  }

  /// Get a project by id or name
  pub async fn get_project(&self, id_or_name: &str) -> Result<Project, ClientError> {
    self.get_json(&["v9", "projects", id_or_name], &[]).await
  }

  pub async fn update_project(
    &self,
    id_or_name: &str,
    update: &ProjectUpdate,
  ) -> Result<Project, ClientError> {
    if update.is_empty() {
      return Err(ClientError::validation(
        "empty_update",
        "project update has no fields set",
      ));
    }
    let body = self
      .call(
        Method::PATCH,
        &["v9", "projects", id_or_name],
        &[],
        Some(to_body(update)?),
      )
      .await?;
    decode(&body)
  }

  pub async fn delete_project(&self, id_or_name: &str) -> Result<DeleteAck, ClientError> {
    self
      .delete(&["v9", "projects", id_or_name])
      .await
  }

  // ==========================================================================
  // Deployments
  // ==========================================================================

  /// List deployments, newest first. Filter with `projectId`, `target`, ...
  pub async fn list_deployments(
    &self,
    params: &ListParams,
  ) -> Result<Page<Deployment>, ClientError> {
    self
      .list(&["v6", "deployments"], params, |d: ApiDeployment| Deployment::from(d))
      .await
  }

  /// Get a deployment by id or URL
  pub async fn get_deployment(&self, id_or_url: &str) -> Result<Deployment, ClientError> {
    let deployment: ApiDeployment = self
      .get_json(&["v13", "deployments", id_or_url], &[])
      .await?;
    Ok(deployment.into())
  }

  pub async fn cancel_deployment(&self, id: &str) -> Result<Deployment, ClientError> {
    let body = self
      .call(Method::PATCH, &["v12", "deployments", id, "cancel"], &[], None)
      .await?;
    let deployment: ApiDeployment = decode(&body)?;
    Ok(deployment.into())
  }

  pub async fn delete_deployment(&self, id: &str) -> Result<DeleteAck, ClientError> {
    self.delete(&["v13", "deployments", id]).await
  }

  // ==========================================================================
  // Domains
  // ==========================================================================

  pub async fn list_domains(&self, params: &ListParams) -> Result<Page<Domain>, ClientError> {
    self.list(&["v5", "domains"], params, |d: Domain| d).await
  }

  pub async fn get_domain(&self, name: &str) -> Result<Domain, ClientError> {
    let response: ApiDomainResponse = self.get_json(&["v5", "domains", name], &[]).await?;
    Ok(response.domain)
  }

  pub async fn add_domain(&self, name: &str) -> Result<Domain, ClientError> {
    if name.trim().is_empty() {
      return Err(ClientError::validation(
        "invalid_name",
        "domain name must not be empty",
      ));
    }
    let body = self
      .call(
        Method::POST,
        &["v5", "domains"],
        &[],
        Some(serde_json::json!({ "name": name.trim() })),
      )
      .await?;
    let response: ApiDomainResponse = decode(&body)?;
    Ok(response.domain)
  }

  pub async fn remove_domain(&self, name: &str) -> Result<DeleteAck, ClientError> {
    self.delete(&["v6", "domains", name]).await
  }

  // ==========================================================================
  // Environment variables
  // ==========================================================================

  /// All environment variables of a project. The endpoint does not paginate.
  pub async fn list_env_vars(&self, project_id: &str) -> Result<Vec<EnvVar>, ClientError> {
    let page: ApiPage<EnvVar> = self
      .get_json(&["v9", "projects", project_id, "env"], &[])
      .await?;
    Ok(page.items)
  }

  /// Create an environment variable. Payloads without a key or without a
  /// target environment are rejected before any request is made.
  pub async fn create_env_var(
    &self,
    project_id: &str,
    var: &NewEnvVar,
  ) -> Result<EnvVar, ClientError> {
    var
      .validate()
      .map_err(|message| ClientError::validation("invalid_env", message))?;

    let body = self
      .call(
        Method::POST,
        &["v10", "projects", project_id, "env"],
        &[],
        Some(to_body(var)?),
      )
      .await?;

    // The API answers with either the created variable or `{"created": ...}`
    let value: Value = decode(&body)?;
    let created = match value.get("created") {
      Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
      Some(inner) => inner.clone(),
      None => value,
    };
    serde_json::from_value(created)
      .map_err(|e| ClientError::Transport(format!("malformed response: {}", e)))
  }

  pub async fn delete_env_var(
    &self,
    project_id: &str,
    env_id: &str,
  ) -> Result<DeleteAck, ClientError> {
    self
      .delete(&["v9", "projects", project_id, "env", env_id])
      .await
  }

  // ==========================================================================
  // Request plumbing
  // ==========================================================================

  async fn list<A, U>(
    &self,
    segments: &[&str],
    params: &ListParams,
    convert: impl FnMut(A) -> U,
  ) -> Result<Page<U>, ClientError>
  where
    A: DeserializeOwned,
  {
    let page: ApiPage<A> = self.get_json(segments, &params.query_pairs()).await?;
    Ok(page.into_page(convert))
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    segments: &[&str],
    query: &[(String, String)],
  ) -> Result<T, ClientError> {
    let body = self.call(Method::GET, segments, query, None).await?;
    decode(&body)
  }

  async fn delete(&self, segments: &[&str]) -> Result<DeleteAck, ClientError> {
    let body = self.call(Method::DELETE, segments, &[], None).await?;
    if body.trim().is_empty() {
      return Ok(DeleteAck::default());
    }
    let ack: ApiAck = decode(&body)?;
    Ok(ack.into())
  }

  fn url(&self, segments: &[&str], query: &[(String, String)]) -> Result<Url, ClientError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ClientError::Transport(format!("invalid API url {}", self.base_url)))?
      .pop_if_empty()
      .extend(segments);

    let team_id = self.credentials.team_id();
    if !query.is_empty() || team_id.is_some() {
      let mut pairs = url.query_pairs_mut();
      for (k, v) in query {
        pairs.append_pair(k, v);
      }
      if let Some(team_id) = team_id {
        pairs.append_pair("teamId", team_id);
      }
    }

    Ok(url)
  }

  /// Send a request and return the body of a successful response.
  async fn call(
    &self,
    method: Method,
    segments: &[&str],
    query: &[(String, String)],
    body: Option<Value>,
  ) -> Result<String, ClientError> {
    let url = self.url(segments, query)?;
    let path = url.path().to_string();

    let mut request = self
      .http
      .request(method.clone(), url)
      .bearer_auth(&self.credentials.token);
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = match request.send().await {
      Ok(response) => response,
      Err(e) => return Err(self.transport_failure(&method, &path, e)),
    };

    let status = response.status();
    let text = match response.text().await {
      Ok(text) => text,
      Err(e) => return Err(self.transport_failure(&method, &path, e)),
    };

    self.sink.emit(Diagnostic::Request {
      method: method.to_string(),
      path,
      status: status.as_u16(),
    });

    if !status.is_success() {
      let fallback = status.canonical_reason().unwrap_or("error");
      return Err(ClientError::from_status(
        status,
        ApiErrorBody::detail_from(&text, fallback),
      ));
    }

    Ok(text)
  }

  fn transport_failure(&self, method: &Method, path: &str, e: reqwest::Error) -> ClientError {
    let error = ClientError::from(e);
    self.sink.emit(Diagnostic::RequestFailed {
      method: method.to_string(),
      path: path.to_string(),
      error: error.to_string(),
    });
    error
  }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
  serde_json::from_str(body)
    .map_err(|e| ClientError::Transport(format!("malformed response: {}", e)))
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, ClientError> {
  serde_json::to_value(value)
    .map_err(|e| ClientError::validation("invalid_payload", e.to_string()))
}

/// Follow `pagination.next` from `params` until a page comes back without
/// one. Short pages are not treated as the end.
pub async fn collect_all<T, F, Fut>(
  params: ListParams,
  mut fetch_page: F,
) -> Result<Vec<T>, ClientError>
where
  F: FnMut(ListParams) -> Fut,
  Fut: Future<Output = Result<Page<T>, ClientError>>,
{
  let mut params = params;
  let mut items = Vec::new();

  loop {
    let page = fetch_page(params.clone()).await?;
    items.extend(page.items);

    match page.pagination.next {
      Some(next) if params.until.as_ref() == Some(&next) => {
        return Err(ClientError::Transport(format!(
          "pagination cursor {} did not advance",
          next
        )));
      }
      Some(next) => params.until = Some(next),
      None => break,
    }
  }

  Ok(items)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vercel::types::{Cursor, Pagination};

  fn page(items: Vec<u32>, next: Option<i64>) -> Page<u32> {
    Page {
      pagination: Pagination {
        count: items.len() as u64,
        next: next.map(Cursor::Number),
        prev: None,
      },
      items,
    }
  }

  #[tokio::test]
  async fn test_collect_all_follows_next_not_page_size() {
    // The second page is short but still has a `next`
    let result = collect_all(ListParams::new(2), |params| async move {
      match params.until {
        None => Ok(page(vec![1, 2], Some(10))),
        Some(Cursor::Number(10)) => Ok(page(vec![3], Some(20))),
        Some(Cursor::Number(20)) => Ok(page(vec![4, 5], None)),
        other => panic!("unexpected cursor {:?}", other),
      }
    })
    .await
    .unwrap();

    assert_eq!(result, vec![1, 2, 3, 4, 5]);
  }

  #[tokio::test]
  async fn test_collect_all_stops_on_stuck_cursor() {
    let result = collect_all(ListParams::new(2), |_params| async move {
      Ok(page(vec![1], Some(10)))
    })
    .await;

    assert!(matches!(result, Err(ClientError::Transport(_))));
  }

  #[tokio::test]
  async fn test_collect_all_propagates_errors() {
    let result: Result<Vec<u32>, _> = collect_all(ListParams::new(2), |_params| async move {
      Err(ClientError::Transport("offline".into()))
    })
    .await;

    assert!(result.unwrap_err().is_retryable());
  }

  #[test]
  fn test_credentials_debug_redacts_token() {
    let creds = Credentials::new("secret-token", Some("team_1".into()));
    let debug = format!("{:?}", creds);
    assert!(!debug.contains("secret-token"));
    assert!(debug.contains("team_1"));
  }

  #[test]
  fn test_empty_team_id_means_personal_scope() {
    let creds = Credentials::new("t", Some(String::new()));
    assert_eq!(creds.team_id(), None);
  }

  #[test]
  fn test_url_attaches_team_scope() {
    let client = ResourceClient::new(
      Credentials::new("t", Some("team_1".into())),
      ClientOptions {
        base_url: "https://api.example.com".into(),
        ..Default::default()
      },
    )
    .unwrap();

    let url = client
      .url(&["v6", "deployments"], &ListParams::new(20).query_pairs())
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.example.com/v6/deployments?limit=20&teamId=team_1"
    );
  }

  #[test]
  fn test_url_sends_one_team_scope_despite_filter() {
    let client = ResourceClient::new(
      Credentials::new("t", Some("team_1".into())),
      ClientOptions {
        base_url: "https://api.example.com".into(),
        ..Default::default()
      },
    )
    .unwrap();

    let params = ListParams::new(20).filter("teamId", "team_2");
    let url = client
      .url(&["v9", "projects"], &params.query_pairs())
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.example.com/v9/projects?limit=20&teamId=team_1"
    );
  }

  #[test]
  fn test_url_encodes_segments_and_skips_empty_query() {
    let client =
      ResourceClient::new(Credentials::new("t", None), ClientOptions::default()).unwrap();
    let url = client.url(&["v5", "domains", "a b/c"], &[]).unwrap();
    assert_eq!(url.as_str(), "https://api.vercel.com/v5/domains/a%20b%2Fc");
  }

  #[test]
  fn test_invalid_base_url() {
    let result = ResourceClient::new(
      Credentials::new("t", None),
      ClientOptions {
        base_url: "not a url".into(),
        ..Default::default()
      },
    );
    assert!(matches!(result, Err(ClientError::Transport(_))));
  }
}
