//! Cache keys and TTL classes for Vercel resources.

use crate::cache::{CacheKey, TtlClass};

use super::types::ListParams;

/// Resource kinds, also the second segment of every cache key.
pub mod kind {
  pub const USER: &str = "user";
  pub const TEAMS: &str = "teams";
  pub const PROJECTS: &str = "projects";
  pub const PROJECT: &str = "project";
  pub const DEPLOYMENTS: &str = "deployments";
  pub const DEPLOYMENT: &str = "deployment";
  pub const DOMAINS: &str = "domains";
  pub const DOMAIN: &str = "domain";
  pub const ENV: &str = "env";
}

/// A logical request whose response can be cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceKey {
  User,
  Teams { params: ListParams },
  Projects { params: ListParams },
  Project { id: String },
  Deployments { params: ListParams },
  Deployment { id: String },
  Domains { params: ListParams },
  Domain { name: String },
  EnvVars { project_id: String },
}

impl ResourceKey {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::User => kind::USER,
      Self::Teams { .. } => kind::TEAMS,
      Self::Projects { .. } => kind::PROJECTS,
      Self::Project { .. } => kind::PROJECT,
      Self::Deployments { .. } => kind::DEPLOYMENTS,
      Self::Deployment { .. } => kind::DEPLOYMENT,
      Self::Domains { .. } => kind::DOMAINS,
      Self::Domain { .. } => kind::DOMAIN,
      Self::EnvVars { .. } => kind::ENV,
    }
  }

  /// Staleness budget used when the caller does not pick one.
  pub fn ttl(&self) -> TtlClass {
    match self {
      Self::Deployments { .. } | Self::Deployment { .. } => TtlClass::Short,
      Self::Projects { .. } | Self::Project { .. } | Self::EnvVars { .. } => TtlClass::Medium,
      Self::Domains { .. } | Self::Domain { .. } | Self::Teams { .. } => TtlClass::Long,
      Self::User => TtlClass::VeryLong,
    }
  }

  /// Storage key for this request under `team_id` (None = personal account).
  pub fn cache_key(&self, team_id: Option<&str>) -> CacheKey {
    let builder = CacheKey::builder(self.kind()).param_opt("teamId", team_id);

    let builder = match self {
      Self::User => builder,
      Self::Teams { params }
      | Self::Projects { params }
      | Self::Deployments { params }
      | Self::Domains { params } => params
        .query_pairs()
        .into_iter()
        .fold(builder, |b, (k, v)| b.param(&k, v)),
      Self::Project { id } | Self::Deployment { id } => builder.param("id", id),
      Self::Domain { name } => builder.param("name", name.to_lowercase()),
      Self::EnvVars { project_id } => builder.param("projectId", project_id),
    };

    builder.build()
  }

  pub fn description(&self) -> String {
    match self {
      Self::User => "current user".to_string(),
      Self::Teams { .. } => "teams".to_string(),
      Self::Projects { params } => page_description("projects", params),
      Self::Project { id } => format!("project {}", id),
      Self::Deployments { params } => page_description("deployments", params),
      Self::Deployment { id } => format!("deployment {}", id),
      Self::Domains { params } => page_description("domains", params),
      Self::Domain { name } => format!("domain {}", name),
      Self::EnvVars { project_id } => format!("env vars of {}", project_id),
    }
  }
}

fn page_description(what: &str, params: &ListParams) -> String {
  match &params.until {
    Some(until) => format!("{} until {}", what, until),
    None => what.to_string(),
  }
}
