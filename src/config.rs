use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::TtlClass;
use crate::vercel::{ClientOptions, Credentials, DEFAULT_API_URL};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Team to scope every request to; personal account when unset
  pub team_id: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      team_id: None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false, every read misses and nothing is persisted
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database location (default: $XDG_DATA_HOME/v9s/cache.db)
  pub path: Option<PathBuf>,
  /// Max age for reads that do not name one
  #[serde(default)]
  pub default_ttl: TtlClass,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      default_ttl: TtlClass::default(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./v9s.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/v9s/config.yaml
  ///
  /// Without an explicit path, a missing file means defaults.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("v9s.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("v9s").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn client_options(&self) -> ClientOptions {
    ClientOptions {
      base_url: self.api.url.clone(),
      timeout: Duration::from_secs(self.api.timeout_secs),
    }
  }

  /// Credentials from the environment token and the configured team.
  pub fn credentials(&self) -> Result<Credentials> {
    Ok(Credentials::new(Self::get_api_token()?, self.api.team_id.clone()))
  }

  /// Get the Vercel API token from environment variables.
  ///
  /// Checks V9S_TOKEN first, then VERCEL_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("V9S_TOKEN")
      .or_else(|_| std::env::var("VERCEL_TOKEN"))
      .map_err(|_| eyre!("Vercel API token not found. Set V9S_TOKEN or VERCEL_TOKEN environment variable."))
  }
}
