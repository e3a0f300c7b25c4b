//! The `RosterStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `seatplan-store-sqlite`).
//! The engine and the API depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  model::{Exam, Hall, HallId, NewExam, NewHall, Session, Student},
  plan::StoredPlan,
};

// ─── Pagination ──────────────────────────────────────────────────────────────

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub skip:  usize,
  pub limit: usize,
}

impl Page {
  pub const DEFAULT_LIMIT: usize = 50;
  pub const MAX_LIMIT: usize = 500;

  /// Build a page from optional caller input, falling back to `default` and
  /// clamping the limit into `1..=max`.
  pub fn clamped(
    skip: Option<usize>,
    limit: Option<usize>,
    default: usize,
    max: usize,
  ) -> Self {
    let max = max.max(1);
    Self {
      skip:  skip.unwrap_or(0),
      limit: limit.unwrap_or(default).clamp(1, max),
    }
  }
}

impl Default for Page {
  fn default() -> Self { Self { skip: 0, limit: Self::DEFAULT_LIMIT } }
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`RosterStore::query_students`]. Results are ordered by
/// ascending reg-no.
#[derive(Debug, Clone, Default)]
pub struct StudentQuery {
  /// Case-insensitive substring over reg-no and name.
  pub search:       Option<String>,
  pub department:   Option<String>,
  /// Only students registered for this subject.
  pub subject_code: Option<String>,
  pub page:         Page,
}

/// Parameters for [`RosterStore::query_exams`]. Results are ordered by
/// date, session, then subject code.
#[derive(Debug, Clone, Default)]
pub struct ExamQuery {
  pub subject_code: Option<String>,
  pub session:      Option<Session>,
  pub page:         Page,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the roster backend: the read-only universe the engine
/// consumes, plus the last committed plan.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RosterStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Halls ─────────────────────────────────────────────────────────────

  /// Persist a validated hall. Names are unique: returns `None`, storing
  /// nothing, when the name is already taken.
  fn add_hall(
    &self,
    input: NewHall,
  ) -> impl Future<Output = Result<Option<Hall>, Self::Error>> + Send + '_;

  fn get_hall(
    &self,
    id: HallId,
  ) -> impl Future<Output = Result<Option<Hall>, Self::Error>> + Send + '_;

  /// All halls in ascending id order.
  fn list_halls(
    &self,
  ) -> impl Future<Output = Result<Vec<Hall>, Self::Error>> + Send + '_;

  /// Remove a hall. Returns `false` if no such hall existed.
  fn delete_hall(
    &self,
    id: HallId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Students ──────────────────────────────────────────────────────────

  /// Insert students whose reg-no is not yet known; existing records are
  /// left untouched. Returns the number of newly saved students.
  fn ingest_students(
    &self,
    students: Vec<Student>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn get_student<'a>(
    &'a self,
    reg_no: &'a str,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + 'a;

  /// Every student in ascending reg-no order.
  fn list_students(
    &self,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  fn query_students<'a>(
    &'a self,
    query: &'a StudentQuery,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + 'a;

  // ── Exams ─────────────────────────────────────────────────────────────

  /// Insert exams whose (date, session, subject_code) key is not yet known.
  /// Returns the number of newly saved exams.
  fn ingest_exams(
    &self,
    exams: Vec<NewExam>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Every exam in ascending id order.
  fn list_exams(
    &self,
  ) -> impl Future<Output = Result<Vec<Exam>, Self::Error>> + Send + '_;

  fn query_exams<'a>(
    &'a self,
    query: &'a ExamQuery,
  ) -> impl Future<Output = Result<Vec<Exam>, Self::Error>> + Send + 'a;

  // ── Committed plan ────────────────────────────────────────────────────

  /// Replace the stored plan with `plan` atomically.
  fn save_plan(
    &self,
    plan: StoredPlan,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The last saved plan, or `None` if no run has ever been committed.
  fn load_plan(
    &self,
  ) -> impl Future<Output = Result<Option<StoredPlan>, Self::Error>> + Send + '_;
}
