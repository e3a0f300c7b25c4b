//! Handlers for `/allot`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/allot` | Runs allotment; 200 with the outcome, 409 if a run is in progress |
//! | `GET`  | `/allot` | The published snapshot and its log |

use std::sync::Arc;

use axum::{Json, extract::State};
use seatplan_core::store::RosterStore;
use seatplan_engine::{AllotmentService, RunOutcome, snapshot::SnapshotRef};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct RunResponse {
  /// `"success"` or `"failed"`.
  pub status:   &'static str,
  pub log:      Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code:     Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message:  Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub snapshot: Option<SnapshotRef>,
}

impl From<RunOutcome> for RunResponse {
  fn from(outcome: RunOutcome) -> Self {
    match outcome {
      RunOutcome::Success { log, snapshot } => Self {
        status: "success",
        log,
        code: None,
        message: None,
        snapshot: Some(snapshot),
      },
      RunOutcome::Failed { log, reason } => Self {
        status: "failed",
        log,
        code: Some(reason.code()),
        message: Some(reason.to_string()),
        snapshot: None,
      },
    }
  }
}

/// `POST /allot`
pub async fn run<S>(
  State(service): State<Arc<AllotmentService<S>>>,
) -> Result<Json<RunResponse>, ApiError>
where
  S: RosterStore + 'static,
{
  let outcome = service.run().await?;
  Ok(Json(outcome.into()))
}

#[derive(Debug, Serialize)]
pub struct CurrentResponse {
  pub snapshot: SnapshotRef,
  pub log:      Vec<String>,
}

/// `GET /allot`
pub async fn current<S>(State(service): State<Arc<AllotmentService<S>>>) -> Json<CurrentResponse>
where
  S: RosterStore + 'static,
{
  let snapshot = service.snapshot();
  Json(CurrentResponse { snapshot: snapshot.summary(), log: snapshot.log.clone() })
}
