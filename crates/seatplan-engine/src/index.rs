//! Allotment indexes.
//!
//! [`IndexBuilder`] is the mutable working set of one run. It is the only
//! thing the engine consults for occupancy, and it refuses to double-book a
//! seat or seat a student twice for one exam. [`AllotmentIndex`] is the
//! frozen form, keyed for the read paths of a published snapshot.

use std::{
  collections::{BTreeSet, HashMap, HashSet},
  fmt,
};

use chrono::NaiveDate;
use seatplan_core::model::{Allotment, AllotmentId, ExamId, HallId, SeatNumber, Slot};

use crate::{Error, Result};

// ─── Keys & filters ──────────────────────────────────────────────────────────

/// A physical seat during one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeatKey {
  pub hall_id:     HallId,
  pub seat_number: SeatNumber,
  pub slot:        Slot,
}

impl SeatKey {
  pub fn new(hall_id: HallId, seat_number: SeatNumber, slot: Slot) -> Self {
    Self { hall_id, seat_number, slot }
  }

  pub fn of(a: &Allotment) -> Self { Self::new(a.hall_id, a.seat_number, a.slot()) }
}

impl fmt::Display for SeatKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "hall {} seat {} ({})", self.hall_id, self.seat_number, self.slot)
  }
}

/// Restricts [`AllotmentIndex::list`]. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllotmentFilter {
  pub hall_id:      Option<HallId>,
  /// Inclusive lower bound on the exam date.
  pub date_from:    Option<NaiveDate>,
  /// Inclusive upper bound on the exam date.
  pub date_to:      Option<NaiveDate>,
  pub subject_code: Option<String>,
}

impl AllotmentFilter {
  pub fn matches(&self, a: &Allotment) -> bool {
    self.hall_id.is_none_or(|h| a.hall_id == h)
      && self.date_from.is_none_or(|d| a.date >= d)
      && self.date_to.is_none_or(|d| a.date <= d)
      && self
        .subject_code
        .as_deref()
        .is_none_or(|c| a.subject_code.eq_ignore_ascii_case(c))
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// The in-progress, uncommitted working set of a run.
#[derive(Debug, Default)]
pub struct IndexBuilder {
  allotments: Vec<Allotment>,
  by_seat:    HashMap<SeatKey, usize>,
  seated:     HashSet<(String, ExamId)>,
  next_id:    AllotmentId,
}

impl IndexBuilder {
  pub fn new() -> Self { Self { next_id: 1, ..Default::default() } }

  /// Rebuild a working set from previously committed allotments, checking
  /// every invariant on the way in.
  pub fn from_allotments(allotments: impl IntoIterator<Item = Allotment>) -> Result<Self> {
    let mut builder = Self::new();
    for a in allotments {
      builder.insert(a)?;
    }
    Ok(builder)
  }

  /// The id the next allotment should carry.
  pub fn next_id(&self) -> AllotmentId { self.next_id }

  pub fn is_occupied(&self, hall_id: HallId, seat_number: SeatNumber, slot: Slot) -> bool {
    self.by_seat.contains_key(&SeatKey::new(hall_id, seat_number, slot))
  }

  pub fn occupant(&self, key: &SeatKey) -> Option<&Allotment> {
    self.by_seat.get(key).map(|&i| &self.allotments[i])
  }

  /// Record an allotment. Fails if the seat is already taken in that slot
  /// or the student already holds a seat for the exam.
  pub fn insert(&mut self, allotment: Allotment) -> Result<&Allotment> {
    let key = SeatKey::of(&allotment);
    if self.by_seat.contains_key(&key) {
      return Err(Error::SeatTaken(key));
    }
    let pair = (allotment.student_reg.clone(), allotment.exam_id);
    if self.seated.contains(&pair) {
      return Err(Error::DuplicateAllotment { reg_no: pair.0, exam_id: pair.1 });
    }

    let idx = self.allotments.len();
    self.next_id = self.next_id.max(allotment.id + 1);
    self.by_seat.insert(key, idx);
    self.seated.insert(pair);
    self.allotments.push(allotment);
    Ok(&self.allotments[idx])
  }

  pub fn len(&self) -> usize { self.allotments.len() }

  pub fn is_empty(&self) -> bool { self.allotments.is_empty() }

  /// Freeze into a query index. `students` is the universe of reg-nos that
  /// lookups are answered against.
  pub fn build(self, students: impl IntoIterator<Item = String>) -> AllotmentIndex {
    AllotmentIndex::new(self.allotments, students)
  }
}

// ─── Frozen index ────────────────────────────────────────────────────────────

/// Read-optimised view of a committed plan.
#[derive(Debug, Clone, Default)]
pub struct AllotmentIndex {
  /// Ascending id.
  allotments: Vec<Allotment>,
  /// Positions into `allotments`, ordered by slot then id.
  by_student: HashMap<String, Vec<usize>>,
  by_seat:    HashMap<SeatKey, usize>,
  students:   BTreeSet<String>,
  halls:      BTreeSet<HallId>,
}

impl AllotmentIndex {
  fn new(mut allotments: Vec<Allotment>, students: impl IntoIterator<Item = String>) -> Self {
    allotments.sort_by_key(|a| a.id);

    let mut by_student: HashMap<String, Vec<usize>> = HashMap::new();
    let mut by_seat = HashMap::with_capacity(allotments.len());
    let mut halls = BTreeSet::new();
    for (i, a) in allotments.iter().enumerate() {
      by_student.entry(a.student_reg.clone()).or_default().push(i);
      by_seat.insert(SeatKey::of(a), i);
      halls.insert(a.hall_id);
    }
    for positions in by_student.values_mut() {
      positions.sort_by_key(|&i| (allotments[i].slot(), allotments[i].id));
    }

    let mut students: BTreeSet<String> = students.into_iter().collect();
    students.extend(by_student.keys().cloned());

    Self { allotments, by_student, by_seat, students, halls }
  }

  /// A student's allotments, by date then FN before AN.
  ///
  /// `NotFound` when the reg-no is outside the student universe; a known
  /// student without allotments yields an empty list.
  pub fn by_student(&self, reg_no: &str) -> Result<Vec<&Allotment>> {
    if !self.students.contains(reg_no) {
      return Err(Error::NotFound(format!("student {reg_no} not found")));
    }
    Ok(
      self
        .by_student
        .get(reg_no)
        .map(|positions| positions.iter().map(|&i| &self.allotments[i]).collect())
        .unwrap_or_default(),
    )
  }

  /// One page of matching allotments in ascending id order.
  pub fn list(&self, filter: &AllotmentFilter, skip: usize, limit: usize) -> Vec<&Allotment> {
    self
      .allotments
      .iter()
      .filter(|a| filter.matches(a))
      .skip(skip)
      .take(limit)
      .collect()
  }

  /// Total number of allotments matching `filter`.
  pub fn count(&self, filter: &AllotmentFilter) -> usize {
    self.allotments.iter().filter(|a| filter.matches(a)).count()
  }

  pub fn seat(&self, key: &SeatKey) -> Option<&Allotment> {
    self.by_seat.get(key).map(|&i| &self.allotments[i])
  }

  pub fn references_hall(&self, hall_id: HallId) -> bool { self.halls.contains(&hall_id) }

  pub fn knows_student(&self, reg_no: &str) -> bool { self.students.contains(reg_no) }

  /// All allotments in ascending id order.
  pub fn iter(&self) -> std::slice::Iter<'_, Allotment> { self.allotments.iter() }

  pub fn as_slice(&self) -> &[Allotment] { &self.allotments }

  pub fn len(&self) -> usize { self.allotments.len() }

  pub fn is_empty(&self) -> bool { self.allotments.is_empty() }

  pub fn warning_count(&self) -> usize {
    self.allotments.iter().filter(|a| a.placement.is_warned()).count()
  }
}
