//! Error types for `seatplan-engine`.
//!
//! [`Error`] is returned by individual operations. [`RunFailure`] is the
//! reason carried by a failed [`crate::RunOutcome`]; it never escapes
//! `run()` as an `Err`.

use seatplan_core::model::{ExamId, HallId, SeatNumber, Slot};
use thiserror::Error;

use crate::index::SeatKey;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown hall: {0}")]
  UnknownHall(HallId),

  #[error("seat {seat} does not exist in hall {hall_id} (capacity {capacity})")]
  InvalidSeat {
    hall_id:  HallId,
    seat:     SeatNumber,
    capacity: u32,
  },

  #[error("seat already taken: {0}")]
  SeatTaken(SeatKey),

  #[error("student {reg_no} already holds a seat for exam {exam_id}")]
  DuplicateAllotment { reg_no: String, exam_id: ExamId },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("validation error: {0}")]
  Validation(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("an allotment run is already in progress")]
  ConcurrentRunRejected,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<seatplan_core::Error> for Error {
  fn from(e: seatplan_core::Error) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a run did not publish a new plan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunFailure {
  #[error(
    "capacity exceeded for {slot}: {required} students need seats but only {available} are available"
  )]
  CapacityExceeded {
    slot:      Slot,
    required:  usize,
    available: u64,
  },

  #[error("student {reg_no} is registered for both {first} and {second} in {slot}")]
  RegistrationClash {
    slot:   Slot,
    reg_no: String,
    first:  String,
    second: String,
  },

  #[error("failed to load roster: {0}")]
  Load(String),

  #[error("failed to persist plan: {0}")]
  Persist(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl RunFailure {
  /// Stable machine-readable code for the failure kind.
  pub fn code(&self) -> &'static str {
    match self {
      Self::CapacityExceeded { .. } => "capacity_exceeded",
      Self::RegistrationClash { .. } => "registration_clash",
      Self::Load(_) => "load_failed",
      Self::Persist(_) => "persist_failed",
      Self::Internal(_) => "internal",
    }
  }
}

impl From<Error> for RunFailure {
  fn from(e: Error) -> Self { Self::Internal(e.to_string()) }
}
