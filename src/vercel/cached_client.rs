//! Vercel client with transparent caching.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::cache::{CacheResult, FreshnessCache, KeyValueStore};

use super::cache::{kind, ResourceKey};
use super::client::{collect_all, ResourceClient};
use super::error::ClientError;
use super::types::{
  DeleteAck, Deployment, Domain, EnvVar, ListParams, NewEnvVar, Page, Project, ProjectUpdate,
  Team, User,
};

/// How a read should treat the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPolicy {
  /// Serve a cached entry younger than the resource's TTL class
  #[default]
  CacheFirst,
  /// Serve a cached entry younger than the given age
  MaxAge(Duration),
  /// Skip the cache read, fetch, and overwrite the entry (pull to refresh)
  Refresh,
}

/// Vercel client with transparent caching.
///
/// Reads go through the cache; mutations go straight to the API and then
/// invalidate every entry they could have made wrong.
pub struct CachedClient<S: KeyValueStore> {
  inner: ResourceClient,
  cache: FreshnessCache<S>,
}

impl<S: KeyValueStore> CachedClient<S> {
  pub fn new(inner: ResourceClient, cache: FreshnessCache<S>) -> Self {
    Self { inner, cache }
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub async fn get_user(&self, policy: FetchPolicy) -> Result<CacheResult<User>, ClientError> {
    self
      .fetch(ResourceKey::User, policy, || self.inner.get_user())
      .await
  }

  pub async fn list_teams(
    &self,
    params: &ListParams,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Page<Team>>, ClientError> {
    let key = ResourceKey::Teams {
      params: params.clone(),
    };
    self
      .fetch(key, policy, || self.inner.list_teams(params))
      .await
  }

  pub async fn list_projects(
    &self,
    params: &ListParams,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Page<Project>>, ClientError> {
    let key = ResourceKey::Projects {
      params: params.clone(),
    };
    self
      .fetch(key, policy, || self.inner.list_projects(params))
      .await
  }

  pub async fn get_project(
    &self,
    id: &str,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Project>, ClientError> {
    let key = ResourceKey::Project { id: id.to_string() };
    self
      .fetch(key, policy, || self.inner.get_project(id))
      .await
  }

  pub async fn list_deployments(
    &self,
    params: &ListParams,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Page<Deployment>>, ClientError> {
    let key = ResourceKey::Deployments {
      params: params.clone(),
    };
    self
      .fetch(key, policy, || self.inner.list_deployments(params))
      .await
  }

  /// Every deployment from `params` onwards. Each page is cached on its own.
  pub async fn list_all_deployments(
    &self,
    params: ListParams,
    policy: FetchPolicy,
  ) -> Result<Vec<Deployment>, ClientError> {
    collect_all(params, move |page_params| async move {
      self
        .list_deployments(&page_params, policy)
        .await
        .map(|result| result.data)
    })
    .await
  }

  pub async fn get_deployment(
    &self,
    id: &str,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Deployment>, ClientError> {
    let key = ResourceKey::Deployment { id: id.to_string() };
    self
      .fetch(key, policy, || self.inner.get_deployment(id))
      .await
  }

  pub async fn list_domains(
    &self,
    params: &ListParams,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Page<Domain>>, ClientError> {
    let key = ResourceKey::Domains {
      params: params.clone(),
    };
    self
      .fetch(key, policy, || self.inner.list_domains(params))
      .await
  }

  pub async fn get_domain(
    &self,
    name: &str,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Domain>, ClientError> {
    let key = ResourceKey::Domain {
      name: name.to_string(),
    };
    self
      .fetch(key, policy, || self.inner.get_domain(name))
      .await
  }

  pub async fn list_env_vars(
    &self,
    project_id: &str,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Vec<EnvVar>>, ClientError> {
    let key = ResourceKey::EnvVars {
      project_id: project_id.to_string(),
    };
    self
      .fetch(key, policy, || self.inner.list_env_vars(project_id))
      .await
  }

  // ==========================================================================
  // Mutations (never cached)
  // ==========================================================================

  pub async fn update_project(
    &self,
    id: &str,
    update: &ProjectUpdate,
  ) -> Result<Project, ClientError> {
    let project = self.inner.update_project(id, update).await?;
    // A rename changes what the id-or-name keys resolve to, so drop them all.
    self.invalidate(&[kind::PROJECT, kind::PROJECTS]);
    Ok(project)
  }

  pub async fn delete_project(&self, id: &str) -> Result<DeleteAck, ClientError> {
    let ack = self.inner.delete_project(id).await?;
    self.invalidate(&[
      kind::PROJECT,
      kind::PROJECTS,
      kind::ENV,
      kind::DEPLOYMENTS,
      kind::DEPLOYMENT,
    ]);
    Ok(ack)
  }

  pub async fn cancel_deployment(&self, id: &str) -> Result<Deployment, ClientError> {
    let deployment = self.inner.cancel_deployment(id).await?;
    self.invalidate(&[kind::DEPLOYMENT, kind::DEPLOYMENTS]);
    Ok(deployment)
  }

  pub async fn delete_deployment(&self, id: &str) -> Result<DeleteAck, ClientError> {
    let ack = self.inner.delete_deployment(id).await?;
    self.invalidate(&[kind::DEPLOYMENT, kind::DEPLOYMENTS]);
    Ok(ack)
  }

  pub async fn add_domain(&self, name: &str) -> Result<Domain, ClientError> {
    let domain = self.inner.add_domain(name).await?;
    self.invalidate(&[kind::DOMAIN, kind::DOMAINS]);
    Ok(domain)
  }

  pub async fn remove_domain(&self, name: &str) -> Result<DeleteAck, ClientError> {
    let ack = self.inner.remove_domain(name).await?;
    self.invalidate(&[kind::DOMAIN, kind::DOMAINS]);
    Ok(ack)
  }

  pub async fn create_env_var(
    &self,
    project_id: &str,
    var: &NewEnvVar,
  ) -> Result<EnvVar, ClientError> {
    let created = self.inner.create_env_var(project_id, var).await?;
    self.invalidate(&[kind::ENV]);
    Ok(created)
  }

  pub async fn delete_env_var(
    &self,
    project_id: &str,
    env_id: &str,
  ) -> Result<DeleteAck, ClientError> {
    let ack = self.inner.delete_env_var(project_id, env_id).await?;
    self.invalidate(&[kind::ENV]);
    Ok(ack)
  }

  // ==========================================================================
  // Helpers
  // ==========================================================================

  async fn fetch<T, F, Fut>(
    &self,
    key: ResourceKey,
    policy: FetchPolicy,
    fetcher: F,
  ) -> Result<CacheResult<T>, ClientError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
  {
    let cache_key = key.cache_key(self.inner.team_id());
    tracing::debug!(resource = %key.description(), ?policy, "fetching");

    match policy {
      FetchPolicy::CacheFirst => self.cache.fetch_with(&cache_key, key.ttl(), fetcher).await,
      FetchPolicy::MaxAge(max_age) => self.cache.fetch_with(&cache_key, max_age, fetcher).await,
      FetchPolicy::Refresh => self.cache.refresh_with(&cache_key, fetcher).await,
    }
  }

  fn invalidate(&self, kinds: &[&str]) {
    for kind in kinds {
      self.cache.invalidate_kind(kind);
    }
  }
}

impl<S: KeyValueStore> Clone for CachedClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
    }
  }
}
