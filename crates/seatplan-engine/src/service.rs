//! [`AllotmentService`]: run orchestration, publication and queries.
//!
//! One writer, many readers. A run takes `run_lock` with `try_lock`, so a
//! second concurrent run is turned away immediately. The run computes a new
//! [`Snapshot`] in isolation, persists it, and only then swaps the published
//! `Arc`. Readers clone that `Arc` under a short read lock and keep a
//! consistent plan for as long as they hold it.

use std::{
  collections::BTreeSet,
  sync::{Arc, PoisonError, RwLock},
};

use chrono::Utc;
use seatplan_core::{
  model::{Exam, Hall, HallId, NewExam, NewHall, NewStudent, Slot, Student},
  store::{ExamQuery, Page, RosterStore, StudentQuery},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result, RunFailure,
  engine::AllotmentEngine,
  index::{AllotmentFilter, AllotmentIndex, IndexBuilder},
  snapshot::{AllotmentRow, Snapshot, SnapshotRef, Universe, fingerprint},
  topology::{RowWidth, SeatingTopology},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
  pub row_width:         RowWidth,
  pub default_page_size: usize,
  pub max_page_size:     usize,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      row_width:         RowWidth::Auto,
      default_page_size: Page::DEFAULT_LIMIT,
      max_page_size:     Page::MAX_LIMIT,
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// The result of [`AllotmentService::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
  Success { log: Vec<String>, snapshot: SnapshotRef },
  /// Nothing was published; `log` runs up to the point of failure.
  Failed { log: Vec<String>, reason: RunFailure },
}

impl RunOutcome {
  pub fn log(&self) -> &[String] {
    match self {
      Self::Success { log, .. } | Self::Failed { log, .. } => log,
    }
  }

  pub fn is_success(&self) -> bool { matches!(self, Self::Success { .. }) }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentAllotments {
  pub student:    Student,
  /// By date, then FN before AN.
  pub allotments: Vec<AllotmentRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowPage {
  pub total: usize,
  pub skip:  usize,
  pub limit: usize,
  pub items: Vec<AllotmentRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
  /// Zero-based position in the uploaded batch.
  pub index:  usize,
  pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
  pub parsed_count: usize,
  pub saved_count:  usize,
  pub rejected:     Vec<RejectedRecord>,
}

fn store_err<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(e))
}

/// Deserialise and validate each record, setting aside the ones that fail.
fn triage<T, U>(
  records: Vec<serde_json::Value>,
  validate: impl Fn(T) -> seatplan_core::Result<U>,
) -> (Vec<U>, Vec<RejectedRecord>)
where
  T: DeserializeOwned,
{
  let mut accepted = Vec::with_capacity(records.len());
  let mut rejected = Vec::new();
  for (index, raw) in records.into_iter().enumerate() {
    let checked = serde_json::from_value::<T>(raw)
      .map_err(|e| e.to_string())
      .and_then(|record| validate(record).map_err(|e| e.to_string()));
    match checked {
      Ok(record) => accepted.push(record),
      Err(reason) => rejected.push(RejectedRecord { index, reason }),
    }
  }
  (accepted, rejected)
}

// ─── Run computation ─────────────────────────────────────────────────────────

struct Roster {
  students: Vec<Student>,
  exams:    Vec<Exam>,
  halls:    Vec<Hall>,
}

struct Computed {
  log:      Vec<String>,
  index:    AllotmentIndex,
  universe: Universe,
}

/// The CPU-bound part of a run: every slot in ascending order against one
/// working set. On failure returns the log so far.
fn compute(roster: Roster, row_width: RowWidth) -> Result<Computed, (Vec<String>, RunFailure)> {
  let Roster { students, exams, halls } = roster;
  let mut log = Vec::new();
  let mut working = IndexBuilder::new();

  if !students.is_empty() && !halls.is_empty() {
    let topology = SeatingTopology::new(&halls, row_width);
    let engine = AllotmentEngine::new(&topology);
    let slots: BTreeSet<Slot> = exams.iter().map(Exam::slot).collect();
    let mut active_slots = 0usize;
    let mut warnings = 0usize;

    for slot in slots {
      let report = match engine.allot_slot(slot, &exams, &students, &mut working) {
        Ok(report) => report,
        Err(reason) => return Err((log, reason)),
      };
      if report.is_empty() {
        continue;
      }
      for w in &report.warnings {
        warn!(
          %slot,
          reg_no = %w.reg_no,
          subject = %w.subject_code,
          hall = w.hall_id,
          seat = w.seat_number,
          "adjacency relaxed"
        );
      }
      active_slots += 1;
      warnings += report.warnings.len();
      log.extend(report.log_lines());
    }

    if active_slots > 0 {
      log.push(format!(
        "Allotment complete: {} seat(s) assigned across {active_slots} slot(s), {warnings} warning(s)",
        working.len(),
      ));
    }
  }

  let index = working.build(students.iter().map(|s| s.reg_no.clone()));
  Ok(Computed { log, index, universe: Universe::new(students, exams, halls) })
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct AllotmentService<S> {
  store:     Arc<S>,
  config:    ServiceConfig,
  published: RwLock<Arc<Snapshot>>,
  run_lock:  Mutex<()>,
}

impl<S> AllotmentService<S>
where
  S: RosterStore + 'static,
{
  /// Wrap `store`, restoring its last committed plan as the published
  /// snapshot.
  pub async fn open(store: Arc<S>, config: ServiceConfig) -> Result<Self> {
    let initial = match store.load_plan().await.map_err(store_err)? {
      Some(plan) => {
        let roster = load_roster(&*store).await?;
        let universe = Universe::new(roster.students, roster.exams, roster.halls);
        let snapshot = Snapshot::restore(plan, universe)?;
        info!(
          version = snapshot.version,
          allotments = snapshot.index.len(),
          "restored committed plan"
        );
        snapshot
      }
      None => Snapshot::empty(),
    };
    Ok(Self {
      store,
      config,
      published: RwLock::new(Arc::new(initial)),
      run_lock: Mutex::new(()),
    })
  }

  /// The currently published snapshot.
  pub fn snapshot(&self) -> Arc<Snapshot> {
    let guard = self.published.read().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(&guard)
  }

  fn publish(&self, snapshot: Snapshot) {
    let mut guard = self.published.write().unwrap_or_else(PoisonError::into_inner);
    *guard = Arc::new(snapshot);
  }

  /// A page window using the configured default and maximum sizes.
  pub fn page(&self, skip: Option<usize>, limit: Option<usize>) -> Page {
    Page::clamped(skip, limit, self.config.default_page_size, self.config.max_page_size)
  }

  // ── Run ──────────────────────────────────────────────────────────────────

  /// Allot seats for every slot and publish the result.
  ///
  /// Only [`Error::ConcurrentRunRejected`] is returned as an `Err`; every
  /// other problem is a [`RunOutcome::Failed`] and leaves the published
  /// snapshot untouched.
  pub async fn run(&self) -> Result<RunOutcome> {
    let Ok(_guard) = self.run_lock.try_lock() else {
      warn!("allotment run rejected: another run is in progress");
      return Err(Error::ConcurrentRunRejected);
    };
    info!("allotment run started");

    let roster = match load_roster(&*self.store).await {
      Ok(roster) => roster,
      Err(e) => return Ok(self.fail(Vec::new(), RunFailure::Load(e.to_string()))),
    };
    info!(
      students = roster.students.len(),
      exams = roster.exams.len(),
      halls = roster.halls.len(),
      "roster loaded"
    );

    let row_width = self.config.row_width;
    let computed = match tokio::task::spawn_blocking(move || compute(roster, row_width)).await {
      Ok(Ok(computed)) => computed,
      Ok(Err((log, reason))) => return Ok(self.fail(log, reason)),
      Err(e) => {
        return Ok(self.fail(Vec::new(), RunFailure::Internal(format!("allotment task failed: {e}"))));
      }
    };

    let published_at = Utc::now();
    let snapshot = Snapshot {
      id:           Uuid::new_v4(),
      version:      self.snapshot().version + 1,
      published_at: Some(published_at),
      fingerprint:  fingerprint(computed.index.as_slice()),
      index:        computed.index,
      log:          computed.log,
      universe:     computed.universe,
    };

    if let Err(e) = self.store.save_plan(snapshot.to_stored(published_at)).await {
      return Ok(self.fail(snapshot.log, RunFailure::Persist(e.to_string())));
    }

    let summary = snapshot.summary();
    let log = snapshot.log.clone();
    self.publish(snapshot);
    info!(
      version = summary.version,
      allotments = summary.allotments,
      warnings = summary.warnings,
      fingerprint = %summary.fingerprint,
      "allotment run published"
    );
    Ok(RunOutcome::Success { log, snapshot: summary })
  }

  fn fail(&self, mut log: Vec<String>, reason: RunFailure) -> RunOutcome {
    error!(code = reason.code(), %reason, "allotment run failed");
    log.push(format!("Allotment failed: {reason}"));
    RunOutcome::Failed { log, reason }
  }

  // ── Queries over the published snapshot ──────────────────────────────────

  /// A student and their allotments in the published plan.
  pub async fn search(&self, reg_no: &str) -> Result<StudentAllotments> {
    let reg_no = reg_no.trim();
    let student = self
      .store
      .get_student(reg_no)
      .await
      .map_err(store_err)?
      .ok_or_else(|| Error::NotFound(format!("student {reg_no} not found")))?;

    let snapshot = self.snapshot();
    // Students ingested after the last run are unknown to its index.
    let allotments = if snapshot.index.knows_student(reg_no) {
      snapshot
        .index
        .by_student(reg_no)?
        .into_iter()
        .map(|a| snapshot.row(a))
        .collect()
    } else {
      Vec::new()
    };
    Ok(StudentAllotments { student, allotments })
  }

  /// Raw allotments, ascending id.
  pub fn list(&self, filter: &AllotmentFilter, page: Page) -> Vec<seatplan_core::model::Allotment> {
    self
      .snapshot()
      .index
      .list(filter, page.skip, page.limit)
      .into_iter()
      .cloned()
      .collect()
  }

  /// Display rows, ascending id, with the total match count.
  pub fn list_rows(&self, filter: &AllotmentFilter, page: Page) -> RowPage {
    let snapshot = self.snapshot();
    RowPage {
      total: snapshot.index.count(filter),
      skip:  page.skip,
      limit: page.limit,
      items: snapshot.rows(filter, page.skip, page.limit),
    }
  }

  pub fn count(&self, filter: &AllotmentFilter) -> usize { self.snapshot().index.count(filter) }

  // ── Halls ────────────────────────────────────────────────────────────────

  pub async fn list_halls(&self) -> Result<Vec<Hall>> {
    self.store.list_halls().await.map_err(store_err)
  }

  pub async fn create_hall(&self, input: NewHall) -> Result<Hall> {
    let input = input.validate()?;
    let name = input.name.clone();
    let hall = self
      .store
      .add_hall(input)
      .await
      .map_err(store_err)?
      .ok_or_else(|| Error::Validation(format!("hall name {name:?} is already in use")))?;
    info!(hall_id = hall.id, name = %hall.name, capacity = hall.capacity, "hall created");
    Ok(hall)
  }

  /// Refused while a run is in progress or the published plan seats anyone
  /// in the hall.
  pub async fn delete_hall(&self, id: HallId) -> Result<()> {
    // Held until the row is gone so no run can load the hall meanwhile.
    let Ok(_guard) = self.run_lock.try_lock() else {
      warn!(hall_id = id, "hall deletion rejected: an allotment run is in progress");
      return Err(Error::Conflict(format!(
        "hall {id} cannot be deleted while an allotment run is in progress"
      )));
    };
    if self.snapshot().index.references_hall(id) {
      return Err(Error::Conflict(format!(
        "hall {id} is referenced by the published seating plan"
      )));
    }
    if !self.store.delete_hall(id).await.map_err(store_err)? {
      return Err(Error::NotFound(format!("hall {id} not found")));
    }
    info!(hall_id = id, "hall deleted");
    Ok(())
  }

  // ── Roster ───────────────────────────────────────────────────────────────

  pub async fn query_students(&self, query: &StudentQuery) -> Result<Vec<Student>> {
    self.store.query_students(query).await.map_err(store_err)
  }

  pub async fn query_exams(&self, query: &ExamQuery) -> Result<Vec<Exam>> {
    self.store.query_exams(query).await.map_err(store_err)
  }

  /// Validate and save a batch of student records. Existing reg-nos are
  /// skipped, not overwritten.
  pub async fn ingest_students(&self, records: Vec<serde_json::Value>) -> Result<IngestReport> {
    let parsed_count = records.len();
    let (students, rejected) = triage(records, NewStudent::validate);
    let saved_count = if students.is_empty() {
      0
    } else {
      self.store.ingest_students(students).await.map_err(store_err)?
    };
    info!(parsed_count, saved_count, rejected = rejected.len(), "students ingested");
    Ok(IngestReport { parsed_count, saved_count, rejected })
  }

  /// Validate and save a batch of exam records. Existing (date, session,
  /// subject) keys are skipped.
  pub async fn ingest_exams(&self, records: Vec<serde_json::Value>) -> Result<IngestReport> {
    let parsed_count = records.len();
    let (exams, rejected) = triage(records, NewExam::validate);
    let saved_count = if exams.is_empty() {
      0
    } else {
      self.store.ingest_exams(exams).await.map_err(store_err)?
    };
    info!(parsed_count, saved_count, rejected = rejected.len(), "exams ingested");
    Ok(IngestReport { parsed_count, saved_count, rejected })
  }
}

async fn load_roster<S: RosterStore>(store: &S) -> Result<Roster> {
  Ok(Roster {
    students: store.list_students().await.map_err(store_err)?,
    exams:    store.list_exams().await.map_err(store_err)?,
    halls:    store.list_halls().await.map_err(store_err)?,
  })
}
