//! The immutable, published seating plan.
//!
//! A [`Snapshot`] is built once at the end of a successful run (or restored
//! from the store at start-up) and never mutated afterwards. Readers hold an
//! `Arc<Snapshot>` and see one consistent plan for as long as they keep it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use seatplan_core::{
  model::{Allotment, AllotmentId, Exam, ExamId, Hall, HallId, SeatNumber, Session, Student},
  plan::StoredPlan,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::index::{AllotmentFilter, AllotmentIndex};

/// The roster a plan was computed against, kept for display joins.
#[derive(Debug, Clone, Default)]
pub struct Universe {
  pub students: BTreeMap<String, Student>,
  pub exams:    BTreeMap<ExamId, Exam>,
  pub halls:    BTreeMap<HallId, Hall>,
}

impl Universe {
  pub fn new(students: Vec<Student>, exams: Vec<Exam>, halls: Vec<Hall>) -> Self {
    Self {
      students: students.into_iter().map(|s| (s.reg_no.clone(), s)).collect(),
      exams:    exams.into_iter().map(|e| (e.id, e)).collect(),
      halls:    halls.into_iter().map(|h| (h.id, h)).collect(),
    }
  }
}

/// A lightweight description of a published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRef {
  pub snapshot_id:  Uuid,
  pub version:      u64,
  pub published_at: Option<DateTime<Utc>>,
  pub allotments:   usize,
  pub warnings:     usize,
  pub fingerprint:  String,
}

/// One allotment joined with the names a human wants to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllotmentRow {
  pub id:           AllotmentId,
  pub student_reg:  String,
  pub student_name: String,
  pub subject_code: String,
  pub subject_name: String,
  pub exam_date:    NaiveDate,
  pub session:      Session,
  pub hall_id:      HallId,
  pub hall_name:    String,
  pub seat_number:  SeatNumber,
  pub warned:       bool,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
  pub id:           Uuid,
  /// `0` for the empty plan that exists before any run.
  pub version:      u64,
  pub published_at: Option<DateTime<Utc>>,
  pub index:        AllotmentIndex,
  pub log:          Vec<String>,
  pub fingerprint:  String,
  pub universe:     Universe,
}

impl Snapshot {
  pub fn empty() -> Self {
    let index = AllotmentIndex::default();
    Self {
      id: Uuid::nil(),
      version: 0,
      published_at: None,
      fingerprint: fingerprint(index.as_slice()),
      index,
      log: Vec::new(),
      universe: Universe::default(),
    }
  }

  /// Restore a persisted plan against the current roster.
  pub fn restore(plan: StoredPlan, universe: Universe) -> crate::Result<Self> {
    let builder = crate::index::IndexBuilder::from_allotments(plan.allotments)?;
    let index = builder.build(universe.students.keys().cloned());
    Ok(Self {
      id: plan.snapshot_id,
      version: plan.version,
      published_at: Some(plan.published_at),
      fingerprint: fingerprint(index.as_slice()),
      index,
      log: plan.log,
      universe,
    })
  }

  pub fn summary(&self) -> SnapshotRef {
    SnapshotRef {
      snapshot_id:  self.id,
      version:      self.version,
      published_at: self.published_at,
      allotments:   self.index.len(),
      warnings:     self.index.warning_count(),
      fingerprint:  self.fingerprint.clone(),
    }
  }

  /// The persisted form of this snapshot.
  pub fn to_stored(&self, published_at: DateTime<Utc>) -> StoredPlan {
    StoredPlan {
      snapshot_id: self.id,
      version: self.version,
      published_at,
      allotments: self.index.as_slice().to_vec(),
      log: self.log.clone(),
    }
  }

  /// One page of display rows in ascending allotment id.
  pub fn rows(&self, filter: &AllotmentFilter, skip: usize, limit: usize) -> Vec<AllotmentRow> {
    self
      .index
      .list(filter, skip, limit)
      .into_iter()
      .map(|a| self.row(a))
      .collect()
  }

  /// Names fall back to the raw keys when the roster no longer has them.
  pub fn row(&self, a: &Allotment) -> AllotmentRow {
    let u = &self.universe;
    AllotmentRow {
      id:           a.id,
      student_reg:  a.student_reg.clone(),
      student_name: u
        .students
        .get(&a.student_reg)
        .map_or_else(|| a.student_reg.clone(), |s| s.name.clone()),
      subject_code: a.subject_code.clone(),
      subject_name: u
        .exams
        .get(&a.exam_id)
        .map_or_else(|| a.subject_code.clone(), |e| e.subject_name.clone()),
      exam_date:    a.date,
      session:      a.session,
      hall_id:      a.hall_id,
      hall_name:    u
        .halls
        .get(&a.hall_id)
        .map_or_else(|| format!("hall {}", a.hall_id), |h| h.name.clone()),
      seat_number:  a.seat_number,
      warned:       a.placement.is_warned(),
    }
  }
}

/// SHA-256 over the canonical allotment tuples.
///
/// Stable: the same allotments in any order give the same fingerprint.
pub fn fingerprint(allotments: &[Allotment]) -> String {
  let mut sorted: Vec<&Allotment> = allotments.iter().collect();
  sorted.sort_by_key(|a| a.id);

  let mut hasher = Sha256::new();
  for a in sorted {
    hasher.update(a.id.to_le_bytes());
    hasher.update(a.student_reg.as_bytes());
    hasher.update([0]);
    hasher.update(a.exam_id.to_le_bytes());
    hasher.update(a.subject_code.as_bytes());
    hasher.update([0]);
    hasher.update(a.hall_id.to_le_bytes());
    hasher.update(a.seat_number.to_le_bytes());
    hasher.update(a.date.to_string().as_bytes());
    hasher.update(a.session.as_str().as_bytes());
    hasher.update([u8::from(a.placement.is_warned())]);
  }
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use seatplan_core::model::Placement;

  use super::*;

  fn allot(id: u64, reg: &str, seat: u32) -> Allotment {
    Allotment {
      id,
      student_reg: reg.into(),
      exam_id: 1,
      subject_code: "CS101".into(),
      hall_id: 1,
      seat_number: seat,
      date: NaiveDate::from_ymd_opt(2024, 11, 20).unwrap(),
      session: Session::Forenoon,
      placement: Placement::Clean,
    }
  }

  #[test]
  fn fingerprint_ignores_input_order() {
    let a = vec![allot(1, "2000", 1), allot(2, "2001", 3)];
    let b = vec![allot(2, "2001", 3), allot(1, "2000", 1)];
    assert_eq!(fingerprint(&a), fingerprint(&b));
    assert_eq!(fingerprint(&a).len(), 64);
  }

  #[test]
  fn fingerprint_changes_with_seat_and_tag() {
    let base = vec![allot(1, "2000", 1)];
    let moved = vec![allot(1, "2000", 2)];
    let mut warned = base.clone();
    warned[0].placement = Placement::Warned { conflicts: vec!["1999".into()] };
    assert_ne!(fingerprint(&base), fingerprint(&moved));
    assert_ne!(fingerprint(&base), fingerprint(&warned));
  }

  #[test]
  fn rows_join_names_and_fall_back_to_keys() {
    let hall = Hall { id: 1, name: "Main".into(), capacity: 4 };
    let universe = Universe::new(Vec::new(), Vec::new(), vec![hall]);
    let plan = StoredPlan {
      snapshot_id: Uuid::new_v4(),
      version: 1,
      published_at: Utc::now(),
      allotments: vec![allot(1, "2000", 1)],
      log: Vec::new(),
    };
    let snap = Snapshot::restore(plan, universe).unwrap();
    let rows = snap.rows(&AllotmentFilter::default(), 0, 10);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hall_name, "Main");
    assert_eq!(rows[0].student_name, "2000");
    assert_eq!(rows[0].subject_name, "CS101");
    assert_eq!(snap.summary().allotments, 1);
  }

  #[test]
  fn empty_snapshot_is_version_zero() {
    let snap = Snapshot::empty();
    assert_eq!(snap.version, 0);
    assert!(snap.index.is_empty());
    assert!(snap.published_at.is_none());
  }
}
