//! Handlers for `/halls`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/halls` | Ascending id |
//! | `POST`   | `/halls` | Body: `{"name":"Main","capacity":30}`; 201, 422 if invalid |
//! | `DELETE` | `/halls/{id}` | 204; 404 if absent; 409 if the published plan uses it |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use seatplan_core::{
  model::{Hall, HallId, NewHall},
  store::RosterStore,
};
use seatplan_engine::AllotmentService;

use crate::error::ApiError;

/// `GET /halls`
pub async fn list<S>(
  State(service): State<Arc<AllotmentService<S>>>,
) -> Result<Json<Vec<Hall>>, ApiError>
where
  S: RosterStore + 'static,
{
  Ok(Json(service.list_halls().await?))
}

/// `POST /halls`
pub async fn create<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Json(body): Json<NewHall>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RosterStore + 'static,
{
  let hall = service.create_hall(body).await?;
  Ok((StatusCode::CREATED, Json(hall)))
}

/// `DELETE /halls/{id}`
pub async fn remove<S>(
  State(service): State<Arc<AllotmentService<S>>>,
  Path(id): Path<HallId>,
) -> Result<StatusCode, ApiError>
where
  S: RosterStore + 'static,
{
  service.delete_hall(id).await?;
  Ok(StatusCode::NO_CONTENT)
}
