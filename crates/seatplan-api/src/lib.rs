//! JSON REST API for Seatplan.
//!
//! Exposes an axum [`Router`] backed by an [`AllotmentService`] over any
//! [`RosterStore`]. TLS, auth and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", seatplan_api::api_router(service.clone()))
//! ```

pub mod allot;
pub mod allotments;
pub mod error;
pub mod exams;
pub mod halls;
pub mod students;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use seatplan_core::store::RosterStore;
use seatplan_engine::AllotmentService;

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<AllotmentService<S>>) -> Router<()>
where
  S: RosterStore + 'static,
{
  Router::new()
    // Runs
    .route("/allot", get(allot::current::<S>).post(allot::run::<S>))
    // Published plan
    .route("/allotments", get(allotments::list::<S>))
    .route("/search", get(allotments::search::<S>))
    // Roster
    .route("/students", get(students::list::<S>))
    .route("/upload/students", post(students::upload::<S>))
    .route("/exams", get(exams::list::<S>))
    .route("/upload/exams", post(exams::upload::<S>))
    // Halls
    .route("/halls", get(halls::list::<S>).post(halls::create::<S>))
    .route("/halls/{id}", delete(halls::remove::<S>))
    .with_state(service)
}

// ─── Integration tests ────────────────────────────────────────────────────────
