//! Value types for the allocation universe: students, exams, halls and the
//! allotments produced by a run.
//!
//! Records arriving from ingestion are accepted through the `New*` boundary
//! types, whose `validate` methods reject malformed input before anything
//! reaches the store or the engine.

use std::{collections::BTreeSet, fmt};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

pub type HallId = i64;
pub type ExamId = i64;
pub type AllotmentId = u64;
pub type SeatNumber = u32;

// ─── Session & slot ──────────────────────────────────────────────────────────

/// One of the two daily exam sittings. Forenoon sorts before afternoon.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Session {
  #[serde(rename = "FN", alias = "fn", alias = "forenoon")]
  #[strum(to_string = "FN", serialize = "forenoon")]
  Forenoon,
  #[serde(rename = "AN", alias = "an", alias = "afternoon")]
  #[strum(to_string = "AN", serialize = "afternoon")]
  Afternoon,
}

impl Session {
  /// The short code stored in the database and shown in logs.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Forenoon => "FN",
      Self::Afternoon => "AN",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownSession(s.to_owned()))
  }
}

/// A (date, session) pair: the unit of one engine pass.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Slot {
  pub date:    NaiveDate,
  pub session: Session,
}

impl Slot {
  pub fn new(date: NaiveDate, session: Session) -> Self { Self { date, session } }
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.session)
  }
}

// ─── Universe records ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub reg_no:              String,
  pub name:                String,
  pub department:          String,
  pub year:                String,
  /// Subject codes, sorted and de-duplicated.
  pub subjects_registered: BTreeSet<String>,
}

impl Student {
  pub fn is_registered_for(&self, subject_code: &str) -> bool {
    self.subjects_registered.contains(subject_code)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
  pub id:           ExamId,
  pub date:         NaiveDate,
  pub session:      Session,
  pub subject_code: String,
  pub subject_name: String,
}

impl Exam {
  pub fn slot(&self) -> Slot { Slot::new(self.date, self.session) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hall {
  pub id:       HallId,
  pub name:     String,
  /// Number of seats, numbered `1..=capacity`.
  pub capacity: u32,
}

// ─── Boundary inputs ─────────────────────────────────────────────────────────

/// A student record as produced by an external roster parser.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
  pub reg_no:              String,
  pub name:                String,
  #[serde(default)]
  pub department:          String,
  #[serde(default)]
  pub year:                String,
  #[serde(default)]
  pub subjects_registered: Vec<String>,
}

impl NewStudent {
  /// Trim and check every field, producing the strict [`Student`].
  pub fn validate(self) -> Result<Student> {
    let reg_no = self.reg_no.trim().to_owned();
    if reg_no.is_empty() {
      return Err(Error::invalid("reg_no", "must not be empty"));
    }
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::invalid("name", format!("missing for {reg_no}")));
    }

    let mut subjects_registered = BTreeSet::new();
    for code in self.subjects_registered {
      let code = code.trim();
      if code.is_empty() {
        return Err(Error::invalid(
          "subjects_registered",
          format!("blank subject code for {reg_no}"),
        ));
      }
      subjects_registered.insert(code.to_owned());
    }

    Ok(Student {
      reg_no,
      name,
      department: self.department.trim().to_owned(),
      year: self.year.trim().to_owned(),
      subjects_registered,
    })
  }
}

/// An exam record as produced by an external timetable parser. The id is
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewExam {
  pub date:         NaiveDate,
  pub session:      Session,
  pub subject_code: String,
  #[serde(default)]
  pub subject_name: String,
}

impl NewExam {
  /// Trim the textual fields. A blank subject name falls back to the code.
  pub fn validate(self) -> Result<Self> {
    let subject_code = self.subject_code.trim().to_owned();
    if subject_code.is_empty() {
      return Err(Error::invalid("subject_code", "must not be empty"));
    }
    let subject_name = match self.subject_name.trim() {
      "" => subject_code.clone(),
      name => name.to_owned(),
    };
    Ok(Self { date: self.date, session: self.session, subject_code, subject_name })
  }
}

/// Input for hall creation. `capacity` is signed so that zero and negative
/// values reach validation instead of failing deserialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewHall {
  pub name:     String,
  pub capacity: i64,
}

impl NewHall {
  pub fn validate(self) -> Result<Self> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::invalid("name", "must not be empty"));
    }
    if self.capacity < 1 {
      return Err(Error::invalid("capacity", "must be at least 1"));
    }
    if self.capacity > i64::from(u32::MAX) {
      return Err(Error::invalid("capacity", "is unreasonably large"));
    }
    Ok(Self { name, capacity: self.capacity })
  }
}

// ─── Allotment ───────────────────────────────────────────────────────────────

/// How a seat was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
  /// No occupied neighbour shares the subject.
  #[default]
  Clean,
  /// Adjacency had to be relaxed; `conflicts` lists the reg-nos of the
  /// same-subject neighbours at the time of placement.
  Warned { conflicts: Vec<String> },
}

impl Placement {
  pub fn is_warned(&self) -> bool { matches!(self, Self::Warned { .. }) }
}

/// One student seated for one exam. Created only by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allotment {
  pub id:           AllotmentId,
  pub student_reg:  String,
  pub exam_id:      ExamId,
  pub subject_code: String,
  pub hall_id:      HallId,
  pub seat_number:  SeatNumber,
  pub date:         NaiveDate,
  pub session:      Session,
  pub placement:    Placement,
}

impl Allotment {
  pub fn slot(&self) -> Slot { Slot::new(self.date, self.session) }
}
