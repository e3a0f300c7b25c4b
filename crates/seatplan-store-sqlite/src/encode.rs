//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD` so that text ordering matches
//! date ordering. Timestamps are RFC 3339. Sessions use their short code.
//! Placements and log lines are compact JSON.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use seatplan_core::model::{
  Allotment, Exam, Hall, Placement, SeatNumber, Session, Student,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Dates ────────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Session ──────────────────────────────────────────────────────────────────

pub fn encode_session(s: Session) -> &'static str { s.as_str() }

pub fn decode_session(s: &str) -> Result<Session> { Ok(Session::parse(s)?) }

// ─── Placement & log ─────────────────────────────────────────────────────────

pub fn encode_placement(p: &Placement) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_placement(s: &str) -> Result<Placement> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_log(lines: &[String]) -> Result<String> {
  Ok(serde_json::to_string(lines)?)
}

pub fn decode_log(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

fn to_u32(column: &'static str, value: i64) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::Corrupt { column, value: value.to_string() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `halls` row.
pub struct RawHall {
  pub hall_id:  i64,
  pub name:     String,
  pub capacity: i64,
}

impl RawHall {
  pub fn into_hall(self) -> Result<Hall> {
    Ok(Hall {
      id:       self.hall_id,
      name:     self.name,
      capacity: to_u32("halls.capacity", self.capacity)?,
    })
  }
}

/// Raw values read directly from a `students` row plus its aggregated
/// subject codes.
pub struct RawStudent {
  pub reg_no:     String,
  pub name:       String,
  pub department: String,
  pub year:       String,
  /// `group_concat` of subject codes separated by `\u{1f}`, or `None` when
  /// the student has no registrations.
  pub subjects:   Option<String>,
}

/// Separator used when aggregating subject codes with `group_concat`.
pub const SUBJECT_SEPARATOR: &str = "\u{1f}";

impl RawStudent {
  pub fn into_student(self) -> Student {
    let subjects_registered: BTreeSet<String> = self
      .subjects
      .as_deref()
      .map(|s| {
        s.split(SUBJECT_SEPARATOR)
          .filter(|c| !c.is_empty())
          .map(str::to_owned)
          .collect()
      })
      .unwrap_or_default();

    Student {
      reg_no: self.reg_no,
      name: self.name,
      department: self.department,
      year: self.year,
      subjects_registered,
    }
  }
}

/// Raw values read directly from an `exams` row.
pub struct RawExam {
  pub exam_id:      i64,
  pub date:         String,
  pub session:      String,
  pub subject_code: String,
  pub subject_name: String,
}

impl RawExam {
  pub fn into_exam(self) -> Result<Exam> {
    Ok(Exam {
      id:           self.exam_id,
      date:         decode_date(&self.date)?,
      session:      decode_session(&self.session)?,
      subject_code: self.subject_code,
      subject_name: self.subject_name,
    })
  }
}

/// Raw values read directly from an `allotments` row.
pub struct RawAllotment {
  pub allotment_id: i64,
  pub student_reg:  String,
  pub exam_id:      i64,
  pub subject_code: String,
  pub hall_id:      i64,
  pub seat_number:  i64,
  pub date:         String,
  pub session:      String,
  pub placement:    String,
}

impl RawAllotment {
  pub fn into_allotment(self) -> Result<Allotment> {
    let id = u64::try_from(self.allotment_id).map_err(|_| Error::Corrupt {
      column: "allotments.allotment_id",
      value:  self.allotment_id.to_string(),
    })?;
    let seat_number: SeatNumber = to_u32("allotments.seat_number", self.seat_number)?;

    Ok(Allotment {
      id,
      student_reg: self.student_reg,
      exam_id: self.exam_id,
      subject_code: self.subject_code,
      hall_id: self.hall_id,
      seat_number,
      date: decode_date(&self.date)?,
      session: decode_session(&self.session)?,
      placement: decode_placement(&self.placement)?,
    })
  }
}
