//! HTTP server assembly for Seatplan.
//!
//! Configuration loading and the top-level [`Router`]; the binary in
//! `main.rs` wires these to a SQLite store and a TCP listener.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use seatplan_core::store::RosterStore;
use seatplan_engine::{AllotmentService, ServiceConfig, topology::RowWidth};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SEATPLAN_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Seats per logical row; `None` or `0` picks round(√capacity) per hall.
  pub row_width:         Option<u32>,
  pub default_page_size: usize,
  pub max_page_size:     usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let service = ServiceConfig::default();
    Self {
      host:              "127.0.0.1".to_string(),
      port:              8080,
      store_path:        PathBuf::from("~/.local/share/seatplan/seatplan.db"),
      row_width:         None,
      default_page_size: service.default_page_size,
      max_page_size:     service.max_page_size,
    }
  }
}

impl ServerConfig {
  pub fn service_config(&self) -> ServiceConfig {
    let max_page_size = self.max_page_size.max(1);
    ServiceConfig {
      row_width: RowWidth::from_config(self.row_width),
      default_page_size: self.default_page_size.clamp(1, max_page_size),
      max_page_size,
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Layer the optional TOML file at `path` under `SEATPLAN_*` environment
/// variables.
pub fn load_config(path: &Path) -> Result<ServerConfig, config::ConfigError> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("SEATPLAN"))
    .build()?
    .try_deserialize()
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

/// The full application: the JSON API under `/api`, with request tracing.
pub fn app<S>(service: Arc<AllotmentService<S>>) -> Router
where
  S: RosterStore + 'static,
{
  Router::new()
    .nest("/api", seatplan_api::api_router(service))
    .layer(TraceLayer::new_for_http())
}
