//! Handlers for the exam timetable.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/exams` | `?subject_code&session=FN\|AN&skip&limit` |
//! | `POST` | `/upload/exams` | JSON array of exam records |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use seatplan_core::{
  model::{Exam, Session},
  store::{ExamQuery, RosterStore},
};
use seatplan_engine::{AllotmentService, service::IngestReport};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub subject_code: Option<String>,
  pub session:      Option<Session>,
  pub skip:         Option<usize>,
  pub limit:        Option<usize>,
}

/// `GET /exams`
pub async fn list<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Exam>>, ApiError>
where
  S: RosterStore + 'static,
{
  let query = ExamQuery {
    subject_code: params.subject_code,
    session:      params.session,
    page:         service.page(params.skip, params.limit),
  };
  Ok(Json(service.query_exams(&query).await?))
}

/// `POST /upload/exams`
pub async fn upload<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Json(records): Json<Vec<Value>>,
) -> Result<Json<IngestReport>, ApiError>
where
  S: RosterStore + 'static,
{
  Ok(Json(service.ingest_exams(records).await?))
}
