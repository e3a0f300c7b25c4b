//! Handlers for reading the published plan.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/allotments` | `?hall_id&date_from&date_to&subject_code&skip&limit` |
//! | `GET`  | `/search` | `?reg_no=`; 404 if the student is unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use seatplan_core::{model::HallId, store::RosterStore};
use seatplan_engine::{
  AllotmentService,
  index::AllotmentFilter,
  service::{RowPage, StudentAllotments},
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub hall_id:      Option<HallId>,
  /// Inclusive, `YYYY-MM-DD`.
  pub date_from:    Option<NaiveDate>,
  /// Inclusive, `YYYY-MM-DD`.
  pub date_to:      Option<NaiveDate>,
  pub subject_code: Option<String>,
  pub skip:         Option<usize>,
  pub limit:        Option<usize>,
}

/// `GET /allotments`
pub async fn list<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<RowPage>, ApiError>
where
  S: RosterStore + 'static,
{
  if let (Some(from), Some(to)) = (params.date_from, params.date_to)
    && from > to
  {
    return Err(ApiError::BadRequest(format!("date_from {from} is after date_to {to}")));
  }
  let filter = AllotmentFilter {
    hall_id:      params.hall_id,
    date_from:    params.date_from,
    date_to:      params.date_to,
    subject_code: params.subject_code.filter(|c| !c.trim().is_empty()),
  };
  let page = service.page(params.skip, params.limit);
  Ok(Json(service.list_rows(&filter, page)))
}

// ─── Search ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub reg_no: String,
}

/// `GET /search?reg_no=<reg_no>`
pub async fn search<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<StudentAllotments>, ApiError>
where
  S: RosterStore + 'static,
{
  if params.reg_no.trim().is_empty() {
    return Err(ApiError::BadRequest("reg_no must not be empty".into()));
  }
  Ok(Json(service.search(&params.reg_no).await?))
}
