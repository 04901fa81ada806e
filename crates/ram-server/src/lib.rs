//! Wiring for the `ram-server` binary: configuration, path handling and the
//! top-level router.

use std::path::{Path, PathBuf};

use axum::Router;
use chrono::Duration;
use ram_core::{
  manager::{DEFAULT_INVITATION_TTL_DAYS, RelationshipManager},
  store::AuthorityStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `RAM_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// How long a newly issued invitation code stays claimable.
  pub invitation_ttl_days: i64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                8080,
      store_path:          PathBuf::from("ram.db"),
      invitation_ttl_days: DEFAULT_INVITATION_TTL_DAYS,
    }
  }
}

impl ServerConfig {
  /// Read `file` if it exists, then apply `RAM_*` overrides.
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("RAM"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn invitation_ttl(&self) -> Duration { Duration::days(self.invitation_ttl_days) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API router with request tracing applied.
pub fn app<S>(manager: RelationshipManager<S>) -> Router
where
  S: AuthorityStore + 'static,
{
  ram_api::api_router(manager).layer(TraceLayer::new_for_http())
}
