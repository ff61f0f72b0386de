use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

use v9s::cache::{CacheResult, CacheSource, FreshnessCache, KeyValueStore, NoopStore, SqliteStore};
use v9s::config::Config;
use v9s::logging;
use v9s::vercel::types::{Cursor, EnvTarget, EnvVarType, ListParams, NewEnvVar, Page};
use v9s::vercel::{CachedClient, ClientError, FetchPolicy, ResourceClient};

#[derive(Parser, Debug)]
#[command(name = "v9s")]
#[command(about = "A terminal client for the Vercel REST API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/v9s/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Team id to scope requests to
  #[arg(short, long)]
  team: Option<String>,

  /// Ignore cached data and refetch
  #[arg(short, long, global = true)]
  refresh: bool,

  /// Also log to stderr
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the authenticated user
  User,
  /// List teams
  Teams,
  /// List projects
  Projects {
    #[arg(short, long, default_value_t = 20)]
    limit: u32,
    /// Cursor printed after the previous page
    #[arg(long)]
    until: Option<String>,
  },
  /// List deployments
  Deployments {
    /// Only deployments of this project id
    #[arg(short, long)]
    project: Option<String>,
    #[arg(short, long, default_value_t = 20)]
    limit: u32,
    #[arg(long)]
    until: Option<String>,
    /// Follow pagination to the end
    #[arg(long)]
    all: bool,
  },
  /// Show, cancel or delete a deployment
  Deployment {
    id: String,
    #[arg(long, conflicts_with = "delete")]
    cancel: bool,
    #[arg(long)]
    delete: bool,
  },
  /// List domains
  Domains {
    #[arg(short, long, default_value_t = 20)]
    limit: u32,
    #[arg(long)]
    until: Option<String>,
  },
  /// Add or remove a domain
  Domain {
    #[command(subcommand)]
    action: DomainAction,
  },
  /// Manage project environment variables
  Env {
    #[command(subcommand)]
    action: EnvAction,
  },
  /// Projects, deployments and domains at a glance
  Overview,
  /// Manage the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum DomainAction {
  Add { name: String },
  Rm { name: String },
}

#[derive(Subcommand, Debug)]
enum EnvAction {
  /// List variables of a project
  Ls { project: String },
  /// Add a variable
  Add {
    project: String,
    key: String,
    value: String,
    /// Target environments
    #[arg(short, long, value_delimiter = ',', required = true)]
    target: Vec<TargetArg>,
    /// Store as plain text instead of encrypted
    #[arg(long)]
    plain: bool,
  },
  /// Remove a variable by id
  Rm { project: String, id: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Delete every cached entry
  Clear,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TargetArg {
  Production,
  Preview,
  Development,
}

impl From<TargetArg> for EnvTarget {
  fn from(t: TargetArg) -> Self {
    match t {
      TargetArg::Production => EnvTarget::Production,
      TargetArg::Preview => EnvTarget::Preview,
      TargetArg::Development => EnvTarget::Development,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override team if specified on command line
  if let Some(team) = args.team.clone() {
    config.api.team_id = Some(team);
  }

  let _log_guard = logging::init(&logging::default_log_dir()?, "info", args.verbose)?;

  if config.cache.enabled {
    let store = match &config.cache.path {
      Some(path) => SqliteStore::open(path),
      None => SqliteStore::open_default(),
    }
    .map_err(|e| eyre!("Failed to open cache: {}", e))?;
    run(args, &config, store).await
  } else {
    run(args, &config, NoopStore).await
  }
}

async fn run<S: KeyValueStore>(args: Args, config: &Config, store: S) -> Result<()> {
  let cache = FreshnessCache::new(store).with_default_max_age(config.cache.default_ttl);

  if let Command::Cache {
    action: CacheAction::Clear,
  } = args.command
  {
    cache.clear_all();
    println!("cache cleared");
    return Ok(());
  }

  let client = ResourceClient::new(config.credentials()?, config.client_options())?;
  let api = CachedClient::new(client, cache);
  let policy = if args.refresh {
    FetchPolicy::Refresh
  } else {
    FetchPolicy::CacheFirst
  };

  match execute(&api, args.command, policy).await {
    Err(ClientError::Auth(detail)) => Err(eyre!(
      "{}\nThe token was rejected. Set a valid V9S_TOKEN or VERCEL_TOKEN.",
      detail
    )),
    Err(e) if e.is_retryable() => Err(eyre!("{}\nCheck your connection and try again.", e)),
    other => Ok(other?),
  }
}

async fn execute<S: KeyValueStore>(
  api: &CachedClient<S>,
  command: Command,
  policy: FetchPolicy,
) -> Result<(), ClientError> {
  match command {
    Command::User => {
      let user = api.get_user(policy).await?;
      println!(
        "{} <{}>{}",
        user.data.username,
        user.data.email,
        freshness(&user)
      );
    }
    Command::Teams => {
      let teams = api.list_teams(&ListParams::new(100), policy).await?;
      for team in &teams.data.items {
        println!("{}\t{}", team.id, team.slug);
      }
      print_footer(&teams);
    }
    Command::Projects { limit, until } => {
      let params = ListParams::new(limit).until(until.as_deref().map(parse_cursor));
      let projects = api.list_projects(&params, policy).await?;
      for project in &projects.data.items {
        println!(
          "{}\t{}\t{}",
          project.id,
          project.name,
          project.framework.as_deref().unwrap_or("-")
        );
      }
      print_footer(&projects);
    }
    Command::Deployments {
      project,
      limit,
      until,
      all,
    } => {
      let mut params = ListParams::new(limit).until(until.as_deref().map(parse_cursor));
      if let Some(project) = project {
        params = params.filter("projectId", project);
      }

      if all {
        for d in api.list_all_deployments(params, policy).await? {
          print_deployment(&d);
        }
      } else {
        let deployments = api.list_deployments(&params, policy).await?;
        for d in &deployments.data.items {
          print_deployment(d);
        }
        print_footer(&deployments);
      }
    }
    Command::Deployment { id, cancel, delete } => {
      if cancel {
        let d = api.cancel_deployment(&id).await?;
        print_deployment(&d);
      } else if delete {
        let ack = api.delete_deployment(&id).await?;
        println!("deleted {}", ack.uid.unwrap_or(id));
      } else {
        let d = api.get_deployment(&id, policy).await?;
        print_deployment(&d.data);
      }
    }
    Command::Domains { limit, until } => {
      let params = ListParams::new(limit).until(until.as_deref().map(parse_cursor));
      let domains = api.list_domains(&params, policy).await?;
      for domain in &domains.data.items {
        let verified = if domain.verified { "verified" } else { "unverified" };
        println!("{}\t{}", domain.name, verified);
      }
      print_footer(&domains);
    }
    Command::Domain { action } => match action {
      DomainAction::Add { name } => {
        let domain = api.add_domain(&name).await?;
        println!("added {}", domain.name);
      }
      DomainAction::Rm { name } => {
        api.remove_domain(&name).await?;
        println!("removed {}", name);
      }
    },
    Command::Env { action } => match action {
      EnvAction::Ls { project } => {
        let vars = api.list_env_vars(&project, policy).await?;
        for var in &vars.data {
          let targets: Vec<String> = var
            .target
            .iter()
            .map(|t| format!("{:?}", t).to_lowercase())
            .collect();
          println!(
            "{}\t{}\t{}",
            var.id.as_deref().unwrap_or("-"),
            var.key,
            targets.join(",")
          );
        }
      }
      EnvAction::Add {
        project,
        key,
        value,
        target,
        plain,
      } => {
        let var = NewEnvVar {
          key,
          value,
          kind: if plain {
            EnvVarType::Plain
          } else {
            EnvVarType::Encrypted
          },
          target: target.into_iter().map(EnvTarget::from).collect(),
        };
        let created = api.create_env_var(&project, &var).await?;
        println!("created {}", created.key);
      }
      EnvAction::Rm { project, id } => {
        api.delete_env_var(&project, &id).await?;
        println!("removed {}", id);
      }
    },
    Command::Overview => {
      let params = ListParams::new(5);
      let (projects, deployments, domains) = futures::future::try_join3(
        api.list_projects(&params, policy),
        api.list_deployments(&params, policy),
        api.list_domains(&params, policy),
      )
      .await?;

      println!("projects{}", freshness(&projects));
      for p in &projects.data.items {
        println!("  {}", p.name);
      }
      println!("deployments{}", freshness(&deployments));
      for d in &deployments.data.items {
        print!("  ");
        print_deployment(d);
      }
      println!("domains{}", freshness(&domains));
      for d in &domains.data.items {
        println!("  {}", d.name);
      }
    }
    Command::Cache { .. } => {}
  }

  Ok(())
}

/// Cursors are numeric timestamps in practice; anything else is passed through.
fn parse_cursor(raw: &str) -> Cursor {
  raw
    .parse::<i64>()
    .map(Cursor::Number)
    .unwrap_or_else(|_| Cursor::from(raw))
}

fn print_deployment(d: &v9s::vercel::types::Deployment) {
  let created = d
    .created
    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string());
  let state = d
    .state
    .map(|s| s.to_string())
    .unwrap_or_else(|| "-".to_string());
  println!(
    "{}\t{}\t{}\t{}\t{}",
    d.uid,
    d.name,
    state,
    created,
    d.url.as_deref().unwrap_or("-")
  );
}

fn print_footer<T>(result: &CacheResult<Page<T>>) {
  if let Some(next) = &result.data.pagination.next {
    println!("-- more: --until {}{}", next, freshness(result));
  } else if result.source == CacheSource::Cache {
    println!("--{}", freshness(result));
  }
}

fn freshness<T>(result: &CacheResult<T>) -> String {
  match result.source {
    CacheSource::Network => String::new(),
    CacheSource::Cache => match result.stored_at_utc() {
      Some(stored_at) => {
        let age_secs = (Utc::now() - stored_at).num_seconds().max(0);
        format!(" (cached {}s ago)", age_secs)
      }
      None => " (cached)".to_string(),
    },
  }
}
