use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use v9s::diagnostics::{Diagnostic, RecordingSink};
use v9s::vercel::types::{Cursor, EnvTarget, EnvVarType, ListParams, NewEnvVar};
use v9s::vercel::{collect_all, ClientError, ClientOptions, Credentials, ResourceClient};
use wiremock::matchers::{bearer_token, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, token: &str, team: Option<&str>) -> ResourceClient {
  ResourceClient::new(
    Credentials::new(token, team.map(String::from)),
    ClientOptions {
      base_url: server.uri(),
      ..Default::default()
    },
  )
  .unwrap()
}

fn deployment(uid: &str) -> serde_json::Value {
  json!({
    "uid": uid,
    "name": "web",
    "url": format!("{}.vercel.app", uid),
    "state": "READY",
    "readyState": "READY",
    "created": 1_700_000_000_000_i64,
    "createdAt": 1_700_000_000_000_i64
  })
}

async fn mount_deployment_pages(server: &MockServer) {
  Mock::given(method("GET"))
    .and(path("/v6/deployments"))
    .and(query_param("limit", "20"))
    .and(query_param("teamId", "team_1"))
    .and(query_param("until", "1700000000"))
    .and(bearer_token("good-token"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "deployments": [deployment("dpl_3"), deployment("dpl_4")],
      "pagination": { "count": 2, "next": null, "prev": 1_700_000_500_i64 }
    })))
    .mount(server)
    .await;

  Mock::given(method("GET"))
    .and(path("/v6/deployments"))
    .and(query_param("limit", "20"))
    .and(query_param("teamId", "team_1"))
    .and(query_param_is_missing("until"))
    .and(bearer_token("good-token"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "deployments": [deployment("dpl_1"), deployment("dpl_2")],
      "pagination": { "count": 2, "next": 1_700_000_000_i64, "prev": null }
    })))
    .mount(server)
    .await;
}

#[tokio::test]
async fn test_deployment_pages_do_not_repeat() {
  let server = MockServer::start().await;
  mount_deployment_pages(&server).await;
  let client = client(&server, "good-token", Some("team_1"));

  let first = client
    .list_deployments(&ListParams::new(20))
    .await
    .unwrap();
  assert_eq!(first.pagination.next, Some(Cursor::Number(1_700_000_000)));

  let second = client
    .list_deployments(&ListParams::new(20).until(first.pagination.next.clone()))
    .await
    .unwrap();
  assert!(second.pagination.next.is_none());

  let seen: HashSet<&str> = first.items.iter().map(|d| d.uid.as_str()).collect();
  assert!(second.items.iter().all(|d| !seen.contains(d.uid.as_str())));
  assert_eq!(second.items[0].uid, "dpl_3");
}

#[tokio::test]
async fn test_collect_all_walks_every_page() {
  let server = MockServer::start().await;
  mount_deployment_pages(&server).await;
  let client = client(&server, "good-token", Some("team_1"));

  let all = collect_all(ListParams::new(20), |params| {
    let client = client.clone();
    async move { client.list_deployments(&params).await }
  })
  .await
  .unwrap();

  let uids: Vec<&str> = all.iter().map(|d| d.uid.as_str()).collect();
  assert_eq!(uids, vec!["dpl_1", "dpl_2", "dpl_3", "dpl_4"]);
}

#[tokio::test]
async fn test_personal_scope_sends_no_team_id() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v9/projects"))
    .and(query_param_is_missing("teamId"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "projects": [{ "id": "prj_1", "name": "web", "framework": "nextjs" }],
      "pagination": { "count": 1, "next": null, "prev": null }
    })))
    .expect(1)
    .mount(&server)
    .await;

  let page = client(&server, "good-token", None)
    .list_projects(&ListParams::new(20))
    .await
    .unwrap();
  assert_eq!(page.items[0].id, "prj_1");
  assert_eq!(page.items[0].framework.as_deref(), Some("nextjs"));
}

#[tokio::test]
async fn test_invalid_token_is_an_auth_error() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(bearer_token("bad-token"))
    .respond_with(ResponseTemplate::new(403).set_body_json(json!({
      "error": { "code": "forbidden", "message": "Not authorized", "invalidToken": true }
    })))
    .mount(&server)
    .await;

  let client = client(&server, "bad-token", None);

  let err = client.get_user().await.unwrap_err();
  assert!(err.is_auth());
  assert!(!err.is_not_found());
  assert_eq!(err.detail().unwrap().code, "forbidden");

  let err = client.get_project("prj_1").await.unwrap_err();
  assert!(matches!(err, ClientError::Auth(_)));
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v13/deployments/dpl_missing"))
    .respond_with(ResponseTemplate::new(404).set_body_json(json!({
      "error": { "code": "not_found", "message": "Deployment was not found" }
    })))
    .mount(&server)
    .await;

  let err = client(&server, "good-token", None)
    .get_deployment("dpl_missing")
    .await
    .unwrap_err();
  assert!(err.is_not_found());
  assert!(!err.is_auth());
  assert_eq!(err.detail().unwrap().message, "Deployment was not found");
}

#[tokio::test]
async fn test_env_var_without_targets_is_rejected_locally() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(201))
    .expect(0)
    .mount(&server)
    .await;

  let var = NewEnvVar {
    key: "API_URL".into(),
    value: "https://example.com".into(),
    kind: EnvVarType::Plain,
    target: vec![],
  };
  let err = client(&server, "good-token", None)
    .create_env_var("prj_1", &var)
    .await
    .unwrap_err();
  assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_create_env_var() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/v10/projects/prj_1/env"))
    .and(query_param("teamId", "team_1"))
    .respond_with(ResponseTemplate::new(201).set_body_json(json!({
      "created": {
        "id": "env_1",
        "key": "API_URL",
        "value": "https://example.com",
        "type": "plain",
        "target": ["production", "preview"]
      }
    })))
    .expect(1)
    .mount(&server)
    .await;

  let var = NewEnvVar {
    key: "API_URL".into(),
    value: "https://example.com".into(),
    kind: EnvVarType::Plain,
    target: vec![EnvTarget::Production, EnvTarget::Preview],
  };
  let created = client(&server, "good-token", Some("team_1"))
    .create_env_var("prj_1", &var)
    .await
    .unwrap();
  assert_eq!(created.id.as_deref(), Some("env_1"));
  assert_eq!(created.target, vec![EnvTarget::Production, EnvTarget::Preview]);
}

#[tokio::test]
async fn test_server_side_validation_error() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/v5/domains"))
    .respond_with(ResponseTemplate::new(400).set_body_json(json!({
      "error": { "code": "invalid_domain", "message": "Invalid domain name" }
    })))
    .mount(&server)
    .await;

  let err = client(&server, "good-token", None)
    .add_domain("not a domain")
    .await
    .unwrap_err();
  match err {
    ClientError::Validation(detail) => assert_eq!(detail.code, "invalid_domain"),
    other => panic!("expected validation error, got {:?}", other),
  }
}

#[tokio::test]
async fn test_server_error_is_retryable() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
    .mount(&server)
    .await;

  let err = client(&server, "good-token", None)
    .list_domains(&ListParams::new(20))
    .await
    .unwrap_err();
  assert!(matches!(err, ClientError::Server { .. }));
  assert!(err.is_retryable());
  assert_eq!(err.detail().unwrap().message, "upstream unavailable");
}

#[tokio::test]
async fn test_malformed_body_is_a_transport_error() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v2/user"))
    .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
    .mount(&server)
    .await;

  let err = client(&server, "good-token", None)
    .get_user()
    .await
    .unwrap_err();
  assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_error() {
  let sink = RecordingSink::new();
  let client = ResourceClient::new(
    Credentials::new("good-token", None),
    ClientOptions {
      base_url: "http://127.0.0.1:1".into(),
      ..Default::default()
    },
  )
  .unwrap()
  .with_sink(sink.clone());

  let err = client.get_user().await.unwrap_err();
  assert!(matches!(err, ClientError::Transport(_)));
  assert!(err.is_retryable());
  assert!(matches!(
    sink.events().as_slice(),
    [Diagnostic::RequestFailed { .. }]
  ));
}

#[tokio::test]
async fn test_delete_with_empty_body() {
  let server = MockServer::start().await;
  Mock::given(method("DELETE"))
    .and(path("/v9/projects/prj_1"))
    .respond_with(ResponseTemplate::new(204))
    .expect(1)
    .mount(&server)
    .await;

  let ack = client(&server, "good-token", None)
    .delete_project("prj_1")
    .await
    .unwrap();
  assert_eq!(ack.uid, None);
}

#[tokio::test]
async fn test_delete_deployment_ack() {
  let server = MockServer::start().await;
  Mock::given(method("DELETE"))
    .and(path("/v13/deployments/dpl_1"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(json!({ "uid": "dpl_1", "state": "DELETED" })),
    )
    .mount(&server)
    .await;

  let ack = client(&server, "good-token", None)
    .delete_deployment("dpl_1")
    .await
    .unwrap();
  assert_eq!(ack.uid.as_deref(), Some("dpl_1"));
  assert_eq!(ack.state.as_deref(), Some("DELETED"));
}

#[tokio::test]
async fn test_requests_are_reported_to_the_sink() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v2/user"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "user": { "id": "usr_1", "email": "a@example.com", "username": "alice" }
    })))
    .mount(&server)
    .await;

  let sink = RecordingSink::new();
  let sink_dyn: Arc<dyn v9s::diagnostics::DiagnosticSink> = sink.clone();
  let user = client(&server, "good-token", None)
    .with_sink(sink_dyn)
    .get_user()
    .await
    .unwrap();

  assert_eq!(user.username, "alice");
  assert_eq!(
    sink.events(),
    vec![Diagnostic::Request {
      method: "GET".into(),
      path: "/v2/user".into(),
      status: 200,
    }]
  );
}
