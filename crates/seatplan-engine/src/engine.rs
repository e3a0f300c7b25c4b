//! The greedy per-slot seat assignment.
//!
//! For one (date, session) slot the engine seats every student who has an
//! exam in it:
//!
//! 1. students are grouped by subject; groups are processed largest first,
//!    ties by ascending subject code;
//! 2. within a group students go in ascending reg-no order;
//! 3. halls are visited in ascending id, seats in ascending number;
//! 4. a student takes the first free seat whose occupied neighbours hold no
//!    one sitting the same subject;
//! 5. failing that, the free seat with the fewest same-subject neighbours
//!    (ties by hall id, then seat number), tagged [`Placement::Warned`].
//!
//! Free seats are kept ordered and bucketed by how many neighbours sit the
//! subject being placed, so each pick is a logarithmic lookup rather than a
//! scan of the hall.
//!
//! Nothing here is randomised: equal input yields equal output.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
};

use seatplan_core::model::{
  Allotment, AllotmentId, Exam, HallId, Placement, SeatNumber, Slot, Student,
};

use crate::{
  Result, RunFailure,
  index::{IndexBuilder, SeatKey},
  topology::{HallGrid, SeatingTopology},
};

// ─── Report types ────────────────────────────────────────────────────────────

/// How many students of one subject were seated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectTally {
  pub subject_code: String,
  pub seated:       usize,
}

/// A placement that had to sit next to a same-subject neighbour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyWarning {
  pub reg_no:       String,
  pub subject_code: String,
  pub hall_id:      HallId,
  pub hall_name:    String,
  pub seat_number:  SeatNumber,
  /// Reg-nos of the same-subject neighbours.
  pub conflicts:    Vec<String>,
}

impl fmt::Display for AdjacencyWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} ({}) at {} seat {} is adjacent to same-subject {}",
      self.reg_no,
      self.subject_code,
      self.hall_name,
      self.seat_number,
      self.conflicts.join(", "),
    )
  }
}

/// Everything one slot contributed to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
  pub slot:       Slot,
  /// Students with an exam in this slot.
  pub required:   usize,
  pub available:  u64,
  /// In processing order.
  pub subjects:   Vec<SubjectTally>,
  /// Ids of the allotments created, in placement order.
  pub allotments: Vec<AllotmentId>,
  /// In placement order.
  pub warnings:   Vec<AdjacencyWarning>,
}

impl SlotReport {
  fn new(slot: Slot, required: usize, available: u64) -> Self {
    Self {
      slot,
      required,
      available,
      subjects: Vec::new(),
      allotments: Vec::new(),
      warnings: Vec::new(),
    }
  }

  pub fn is_empty(&self) -> bool { self.required == 0 }

  /// Human-readable log lines: header, per-subject counts, warnings, status.
  /// An empty slot contributes nothing.
  pub fn log_lines(&self) -> Vec<String> {
    if self.is_empty() {
      return Vec::new();
    }
    let slot = self.slot;
    let mut lines = Vec::with_capacity(self.subjects.len() + self.warnings.len() + 2);
    lines.push(format!(
      "[{slot}] {} student(s) in {} subject(s), {} seat(s) available",
      self.required,
      self.subjects.len(),
      self.available,
    ));
    for tally in &self.subjects {
      lines.push(format!("[{slot}] {}: {} seated", tally.subject_code, tally.seated));
    }
    for warning in &self.warnings {
      lines.push(format!("[{slot}] WARNING: {warning}"));
    }
    lines.push(format!(
      "[{slot}] done: {} seated, {} warning(s)",
      self.allotments.len(),
      self.warnings.len(),
    ));
    lines
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct AllotmentEngine<'a> {
  topology: &'a SeatingTopology,
}

impl<'a> AllotmentEngine<'a> {
  pub fn new(topology: &'a SeatingTopology) -> Self { Self { topology } }

  /// Seat every student with an exam in `slot`, recording allotments into
  /// `working`. On failure nothing from this slot should be committed; the
  /// caller discards `working`.
  pub fn allot_slot(
    &self,
    slot: Slot,
    exams: &[Exam],
    students: &[Student],
    working: &mut IndexBuilder,
  ) -> Result<SlotReport, RunFailure> {
    // The lowest exam id wins if a subject is somehow listed twice.
    let mut slot_exams: BTreeMap<&str, &Exam> = BTreeMap::new();
    for exam in exams.iter().filter(|e| e.slot() == slot) {
      slot_exams
        .entry(exam.subject_code.as_str())
        .and_modify(|cur| {
          if exam.id < cur.id {
            *cur = exam;
          }
        })
        .or_insert(exam);
    }

    let mut candidates: Vec<&Student> = students.iter().collect();
    candidates.sort_by(|a, b| a.reg_no.cmp(&b.reg_no));

    let mut groups: BTreeMap<&str, Vec<&Student>> = BTreeMap::new();
    for student in candidates {
      let mut codes = student
        .subjects_registered
        .iter()
        .map(String::as_str)
        .filter(|code| slot_exams.contains_key(code));
      let Some(first) = codes.next() else {
        continue;
      };
      if let Some(second) = codes.next() {
        return Err(RunFailure::RegistrationClash {
          slot,
          reg_no: student.reg_no.clone(),
          first: first.to_owned(),
          second: second.to_owned(),
        });
      }
      groups.entry(first).or_default().push(student);
    }

    let required: usize = groups.values().map(Vec::len).sum();
    let available = self.topology.total_capacity();
    let mut report = SlotReport::new(slot, required, available);
    if required == 0 {
      return Ok(report);
    }
    if required as u64 > available {
      return Err(RunFailure::CapacityExceeded { slot, required, available });
    }

    let mut ordered: Vec<(&str, Vec<&Student>)> = groups.into_iter().collect();
    ordered.sort_by(|(a_code, a), (b_code, b)| {
      b.len().cmp(&a.len()).then_with(|| a_code.cmp(b_code))
    });

    let mut seats = FreeSeats::new(self.topology, slot, working);

    for (code, group) in ordered {
      let Some(exam) = slot_exams.get(code).copied() else {
        return Err(RunFailure::Internal(format!("no exam for {code} in {slot}")));
      };

      for student in &group {
        let (hall_id, seat, clean) = match seats.first_clean() {
          Some((hall_id, seat)) => (hall_id, seat, true),
          None => match seats.least_conflicted() {
            Some((hall_id, seat)) => (hall_id, seat, false),
            None => {
              return Err(RunFailure::CapacityExceeded { slot, required, available });
            }
          },
        };
        let grid = self.topology.grid(hall_id)?;
        let placement = if clean {
          Placement::Clean
        } else {
          Placement::Warned {
            conflicts: same_subject_neighbours(grid, seat, slot, code, working)?,
          }
        };

        let id = working.next_id();
        if let Placement::Warned { conflicts } = &placement {
          report.warnings.push(AdjacencyWarning {
            reg_no:       student.reg_no.clone(),
            subject_code: code.to_owned(),
            hall_id:      grid.hall_id,
            hall_name:    grid.name.clone(),
            seat_number:  seat,
            conflicts:    conflicts.clone(),
          });
        }
        working.insert(Allotment {
          id,
          student_reg: student.reg_no.clone(),
          exam_id: exam.id,
          subject_code: code.to_owned(),
          hall_id: grid.hall_id,
          seat_number: seat,
          date: slot.date,
          session: slot.session,
          placement,
        })?;
        report.allotments.push(id);
        seats.occupy(grid, seat)?;
      }
      seats.next_subject();

      report.subjects.push(SubjectTally {
        subject_code: code.to_owned(),
        seated:       group.len(),
      });
    }

    Ok(report)
  }
}

/// The free seats of one slot, split by how many neighbours already sit the
/// subject currently being placed.
struct FreeSeats {
  /// No neighbour sits the current subject. Ordered by hall id, then seat.
  clean:        BTreeSet<(HallId, SeatNumber)>,
  /// Same-subject neighbour count of every other free seat.
  blocked:      BTreeMap<(HallId, SeatNumber), usize>,
  /// `blocked` ordered by count, then hall id, then seat.
  by_conflicts: BTreeSet<(usize, HallId, SeatNumber)>,
}

impl FreeSeats {
  fn new(topology: &SeatingTopology, slot: Slot, working: &IndexBuilder) -> Self {
    let clean = topology
      .halls()
      .flat_map(|grid| grid.seats().map(move |seat| (grid.hall_id, seat)))
      .filter(|&(hall_id, seat)| !working.is_occupied(hall_id, seat, slot))
      .collect();
    Self { clean, blocked: BTreeMap::new(), by_conflicts: BTreeSet::new() }
  }

  /// Step 4 candidate.
  fn first_clean(&self) -> Option<(HallId, SeatNumber)> { self.clean.first().copied() }

  /// Step 5 candidate.
  fn least_conflicted(&self) -> Option<(HallId, SeatNumber)> {
    self.by_conflicts.first().map(|&(_, hall_id, seat)| (hall_id, seat))
  }

  /// Take `seat` for the current subject and push its free neighbours one
  /// conflict further.
  fn occupy(&mut self, grid: &HallGrid, seat: SeatNumber) -> Result<()> {
    let key = (grid.hall_id, seat);
    if !self.clean.remove(&key)
      && let Some(count) = self.blocked.remove(&key)
    {
      self.by_conflicts.remove(&(count, key.0, key.1));
    }

    for neighbour in grid.adjacent(seat)? {
      let key = (grid.hall_id, neighbour);
      if self.clean.remove(&key) {
        self.blocked.insert(key, 1);
        self.by_conflicts.insert((1, key.0, key.1));
      } else if let Some(count) = self.blocked.get_mut(&key) {
        self.by_conflicts.remove(&(*count, key.0, key.1));
        *count += 1;
        self.by_conflicts.insert((*count, key.0, key.1));
      }
    }
    Ok(())
  }

  /// Each subject is placed as one group; the next starts with every free
  /// seat clean.
  fn next_subject(&mut self) {
    self.clean.extend(std::mem::take(&mut self.blocked).into_keys());
    self.by_conflicts.clear();
  }
}

/// Reg-nos of occupied neighbours of `seat` sitting `code`.
fn same_subject_neighbours(
  grid: &HallGrid,
  seat: SeatNumber,
  slot: Slot,
  code: &str,
  working: &IndexBuilder,
) -> Result<Vec<String>> {
  let mut conflicts = Vec::new();
  for neighbour in grid.adjacent(seat)? {
    if let Some(occupant) = working.occupant(&SeatKey::new(grid.hall_id, neighbour, slot))
      && occupant.subject_code == code
    {
      conflicts.push(occupant.student_reg.clone());
    }
  }
  Ok(conflicts)
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{BTreeSet, HashSet},
    num::NonZeroU32,
  };

  use chrono::NaiveDate;
  use seatplan_core::model::{Hall, Session};

  use super::*;
  use crate::topology::RowWidth;

  fn slot() -> Slot {
    Slot::new(NaiveDate::from_ymd_opt(2024, 11, 20).unwrap(), Session::Forenoon)
  }

  fn hall(id: HallId, capacity: u32) -> Hall {
    Hall { id, name: format!("Hall {id}"), capacity }
  }

  fn exam(id: i64, code: &str) -> Exam {
    Exam {
      id,
      date: slot().date,
      session: slot().session,
      subject_code: code.into(),
      subject_name: format!("{code} paper"),
    }
  }

  fn student(reg_no: &str, subjects: &[&str]) -> Student {
    Student {
      reg_no:              reg_no.into(),
      name:                format!("Student {reg_no}"),
      department:          "CSE".into(),
      year:                "II".into(),
      subjects_registered: subjects.iter().map(|s| s.to_string()).collect(),
    }
  }

  fn width(w: u32) -> RowWidth { RowWidth::Fixed(NonZeroU32::new(w).unwrap()) }

  fn run(
    halls: &[Hall],
    w: RowWidth,
    exams: &[Exam],
    students: &[Student],
  ) -> (Result<SlotReport, RunFailure>, IndexBuilder) {
    let topology = SeatingTopology::new(halls, w);
    let mut working = IndexBuilder::new();
    let result = AllotmentEngine::new(&topology).allot_slot(slot(), exams, students, &mut working);
    (result, working)
  }

  fn seat_of(working: &IndexBuilder, hall_id: HallId, seat: SeatNumber) -> Option<String> {
    working
      .occupant(&SeatKey::new(hall_id, seat, slot()))
      .map(|a| a.student_reg.clone())
  }

  #[test]
  fn capacity_exceeded_when_students_outnumber_seats() {
    let students = [
      student("1", &["CS101"]),
      student("2", &["CS101"]),
      student("3", &["CS101"]),
    ];
    let (result, working) = run(&[hall(1, 2)], RowWidth::Auto, &[exam(1, "CS101")], &students);
    assert_eq!(
      result.unwrap_err(),
      RunFailure::CapacityExceeded { slot: slot(), required: 3, available: 2 }
    );
    assert!(working.is_empty());
  }

  #[test]
  fn adjacent_pair_of_one_subject_is_warned() {
    let students = [student("2000", &["CS101"]), student("2001", &["CS101"])];
    let (result, working) = run(&[hall(1, 2)], RowWidth::Auto, &[exam(1, "CS101")], &students);
    let report = result.unwrap();

    assert_eq!(report.allotments.len(), 2);
    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.reg_no, "2001");
    assert_eq!(warning.conflicts, ["2000"]);
    assert_eq!(seat_of(&working, 1, 1).as_deref(), Some("2000"));
    assert_eq!(seat_of(&working, 1, 2).as_deref(), Some("2001"));

    let lines = report.log_lines();
    assert!(lines.iter().any(|l| l.contains("WARNING") && l.contains("2000") && l.contains("2001")));
  }

  #[test]
  fn two_subjects_split_cleanly_on_a_two_by_two_grid() {
    let students = [
      student("a1", &["A"]),
      student("a2", &["A"]),
      student("b1", &["B"]),
      student("b2", &["B"]),
    ];
    let exams = [exam(1, "A"), exam(2, "B")];
    let (result, working) = run(&[hall(1, 4)], width(2), &exams, &students);
    let report = result.unwrap();

    assert!(report.warnings.is_empty());
    // A goes first (tie on size, lower code): 1 and 4; B fills 2 and 3.
    assert_eq!(seat_of(&working, 1, 1).as_deref(), Some("a1"));
    assert_eq!(seat_of(&working, 1, 4).as_deref(), Some("a2"));
    assert_eq!(seat_of(&working, 1, 2).as_deref(), Some("b1"));
    assert_eq!(seat_of(&working, 1, 3).as_deref(), Some("b2"));
    assert_eq!(report.subjects, [
      SubjectTally { subject_code: "A".into(), seated: 2 },
      SubjectTally { subject_code: "B".into(), seated: 2 },
    ]);
  }

  #[test]
  fn larger_group_is_placed_first() {
    let students = [
      student("1", &["Z"]),
      student("2", &["Z"]),
      student("3", &["A"]),
    ];
    let exams = [exam(1, "A"), exam(2, "Z")];
    let (result, working) = run(&[hall(1, 9)], width(3), &exams, &students);
    let report = result.unwrap();
    assert_eq!(report.subjects[0].subject_code, "Z");
    assert_eq!(seat_of(&working, 1, 1).as_deref(), Some("1"));
  }

  #[test]
  fn overflow_moves_to_next_hall_in_id_order() {
    let students: Vec<Student> = (1..=3).map(|i| student(&i.to_string(), &["A"])).collect();
    // Hall 2 is listed first but visited second.
    let (result, working) = run(
      &[hall(2, 4), hall(1, 1)],
      width(2),
      &[exam(1, "A")],
      &students,
    );
    assert!(result.unwrap().warnings.is_empty());
    assert_eq!(seat_of(&working, 1, 1).as_deref(), Some("1"));
    assert_eq!(seat_of(&working, 2, 1).as_deref(), Some("2"));
    assert_eq!(seat_of(&working, 2, 4).as_deref(), Some("3"));
  }

  #[test]
  fn students_without_exams_in_slot_are_ignored() {
    let students = [student("1", &["A"]), student("2", &["ELSEWHERE"])];
    let (result, working) = run(&[hall(1, 4)], width(2), &[exam(1, "A")], &students);
    assert_eq!(result.unwrap().required, 1);
    assert_eq!(working.len(), 1);
  }

  #[test]
  fn empty_slot_produces_no_log() {
    let (result, _) = run(&[hall(1, 4)], width(2), &[exam(1, "A")], &[]);
    let report = result.unwrap();
    assert!(report.is_empty());
    assert!(report.log_lines().is_empty());
  }

  #[test]
  fn two_exams_in_one_slot_is_a_clash() {
    let students = [student("7", &["A", "B"])];
    let (result, _) = run(&[hall(1, 4)], width(2), &[exam(1, "A"), exam(2, "B")], &students);
    assert!(matches!(
      result.unwrap_err(),
      RunFailure::RegistrationClash { ref reg_no, ref first, ref second, .. }
        if reg_no == "7" && first == "A" && second == "B"
    ));
  }

  #[test]
  fn fewest_conflicts_beats_lower_hall_and_seat() {
    // Hall 1 is one row of three; hall 2 one row of two.
    let students: Vec<Student> = (1..=4).map(|i| student(&format!("a{i}"), &["A"])).collect();
    let (result, working) = run(
      &[hall(1, 3), hall(2, 2)],
      width(3),
      &[exam(1, "A")],
      &students,
    );
    let report = result.unwrap();

    // a1 and a2 take both ends of hall 1, a3 opens hall 2. Hall 1 seat 2 now
    // touches two A students, hall 2 seat 2 only one.
    assert_eq!(seat_of(&working, 1, 1).as_deref(), Some("a1"));
    assert_eq!(seat_of(&working, 1, 3).as_deref(), Some("a2"));
    assert_eq!(seat_of(&working, 2, 1).as_deref(), Some("a3"));
    assert_eq!(seat_of(&working, 2, 2).as_deref(), Some("a4"));
    assert_eq!(seat_of(&working, 1, 2), None);

    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!((warning.hall_id, warning.seat_number), (2, 2));
    assert_eq!(warning.conflicts, ["a3"]);
  }

  #[test]
  fn equal_conflicts_go_to_the_lower_hall_id() {
    let students: Vec<Student> = (1..=3).map(|i| student(&format!("a{i}"), &["A"])).collect();
    // Listed out of id order on purpose.
    let (result, working) = run(
      &[hall(2, 2), hall(1, 2)],
      width(2),
      &[exam(1, "A")],
      &students,
    );
    let report = result.unwrap();

    assert_eq!(seat_of(&working, 1, 1).as_deref(), Some("a1"));
    assert_eq!(seat_of(&working, 2, 1).as_deref(), Some("a2"));
    // Hall 1 seat 2 and hall 2 seat 2 each have one conflict.
    assert_eq!(seat_of(&working, 1, 2).as_deref(), Some("a3"));
    assert_eq!(report.warnings[0].conflicts, ["a1"]);
  }

  #[test]
  fn equal_conflicts_in_one_hall_go_to_the_lower_seat() {
    // 1 2
    // 3 4
    // 5 6
    let students: Vec<Student> = (1..=4).map(|i| student(&format!("a{i}"), &["A"])).collect();
    let (result, working) = run(&[hall(1, 6)], width(2), &[exam(1, "A")], &students);
    let report = result.unwrap();

    assert_eq!(seat_of(&working, 1, 1).as_deref(), Some("a1"));
    assert_eq!(seat_of(&working, 1, 4).as_deref(), Some("a2"));
    assert_eq!(seat_of(&working, 1, 5).as_deref(), Some("a3"));
    // Seats 2 and 6 both touch two A students; seat 3 touches three.
    assert_eq!(seat_of(&working, 1, 2).as_deref(), Some("a4"));
    assert_eq!(report.warnings[0].conflicts, ["a1", "a2"]);
  }

  #[test]
  fn a_later_subject_is_not_blocked_by_an_earlier_one() {
    // A fills a checkerboard of a 3x3 hall; B's seats all border A only.
    let mut students: Vec<Student> = (1..=5).map(|i| student(&format!("a{i}"), &["A"])).collect();
    students.extend((1..=4).map(|i| student(&format!("b{i}"), &["B"])));
    let (result, working) = run(&[hall(1, 9)], width(3), &[exam(1, "A"), exam(2, "B")], &students);
    let report = result.unwrap();

    assert!(report.warnings.is_empty());
    for seat in [1, 3, 5, 7, 9] {
      assert!(seat_of(&working, 1, seat).unwrap().starts_with('a'));
    }
    for seat in [2, 4, 6, 8] {
      assert!(seat_of(&working, 1, seat).unwrap().starts_with('b'));
    }
  }

  #[test]
  fn a_large_single_subject_hall_fills_completely() {
    let n = 10_000;
    let students: Vec<Student> = (0..n).map(|i| student(&format!("R{i:05}"), &["A"])).collect();
    let (result, working) = run(&[hall(1, n as u32)], RowWidth::Auto, &[exam(1, "A")], &students);
    let report = result.unwrap();
    assert_eq!(report.allotments.len(), n);
    assert_eq!(working.len(), n);
    // Half the hall can be seated on a checkerboard; the rest is warned.
    assert_eq!(report.warnings.len(), n / 2);
  }

  /// Deterministic pseudo-random universe.
  fn synthetic(n: usize, subjects: usize) -> Vec<Student> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    (0..n)
      .map(|i| {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        let code = format!("S{:02}", (state >> 33) as usize % subjects);
        student(&format!("R{i:04}"), &[code.as_str()])
      })
      .collect()
  }

  #[test]
  fn every_seat_is_unique_and_clean_seats_have_no_same_subject_neighbour() {
    let students = synthetic(180, 5);
    let exams: Vec<Exam> = (0..5).map(|i| exam(i + 1, &format!("S{i:02}"))).collect();
    let halls = [hall(1, 60), hall(2, 48), hall(3, 90)];
    let topology = SeatingTopology::new(&halls, RowWidth::Auto);
    let mut working = IndexBuilder::new();
    let report = AllotmentEngine::new(&topology)
      .allot_slot(slot(), &exams, &students, &mut working)
      .unwrap();
    assert_eq!(report.allotments.len(), 180);

    let index = working.build(students.iter().map(|s| s.reg_no.clone()));
    let mut seen = HashSet::new();
    for a in index.iter() {
      assert!(seen.insert((a.hall_id, a.seat_number)), "double-booked {a:?}");
      if a.placement.is_warned() {
        continue;
      }
      for n in topology.adjacent_seats(a.hall_id, a.seat_number).unwrap() {
        if let Some(other) = index.seat(&SeatKey::new(a.hall_id, n, slot())) {
          assert_ne!(other.subject_code, a.subject_code, "{a:?} beside {other:?}");
        }
      }
    }
    let warned: BTreeSet<&str> = report.warnings.iter().map(|w| w.reg_no.as_str()).collect();
    let tagged: BTreeSet<&str> = index
      .iter()
      .filter(|a| a.placement.is_warned())
      .map(|a| a.student_reg.as_str())
      .collect();
    assert_eq!(warned, tagged);
  }

  #[test]
  fn identical_input_gives_identical_assignment() {
    let students = synthetic(120, 4);
    let exams: Vec<Exam> = (0..4).map(|i| exam(i + 1, &format!("S{i:02}"))).collect();
    let halls = [hall(1, 50), hall(2, 80)];

    let (first, a) = run(&halls, RowWidth::Auto, &exams, &students);
    let mut reversed = students.clone();
    reversed.reverse();
    let (second, b) = run(&halls, RowWidth::Auto, &exams, &reversed);

    assert_eq!(first.unwrap(), second.unwrap());
    let a = a.build(Vec::new());
    let b = b.build(Vec::new());
    assert_eq!(a.as_slice(), b.as_slice());
  }
}
