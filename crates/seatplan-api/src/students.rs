//! Handlers for the student roster.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/students` | `?search&department&subject_code&skip&limit` |
//! | `POST` | `/upload/students` | JSON array of student records |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use seatplan_core::{
  model::Student,
  store::{RosterStore, StudentQuery},
};
use seatplan_engine::{AllotmentService, service::IngestReport};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// Substring of the reg-no or name.
  pub search:       Option<String>,
  pub department:   Option<String>,
  pub subject_code: Option<String>,
  pub skip:         Option<usize>,
  pub limit:        Option<usize>,
}

/// `GET /students`
pub async fn list<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Student>>, ApiError>
where
  S: RosterStore + 'static,
{
  let query = StudentQuery {
    search:       params.search,
    department:   params.department,
    subject_code: params.subject_code,
    page:         service.page(params.skip, params.limit),
  };
  Ok(Json(service.query_students(&query).await?))
}

/// `POST /upload/students`
pub async fn upload<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Json(records): Json<Vec<Value>>,
) -> Result<Json<IngestReport>, ApiError>
where
  S: RosterStore + 'static,
{
  Ok(Json(service.ingest_students(records).await?))
}
