//! [`SqliteStore`], the SQLite implementation of [`RosterStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, types::Value};

use seatplan_core::{
  model::{Exam, Hall, HallId, NewExam, NewHall, Student},
  plan::StoredPlan,
  store::{ExamQuery, Page, RosterStore, StudentQuery},
};

use crate::{
  encode::{
    RawAllotment, RawExam, RawHall, RawStudent, decode_dt, decode_log, decode_uuid,
    encode_date, encode_dt, encode_log, encode_placement, encode_session, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── SQL fragments ───────────────────────────────────────────────────────────

const STUDENT_COLUMNS: &str = "
  s.reg_no, s.name, s.department, s.year,
  (SELECT group_concat(ss.subject_code, char(31))
     FROM student_subjects ss
    WHERE ss.reg_no = s.reg_no) AS subjects";

const EXAM_COLUMNS: &str = "exam_id, date, session, subject_code, subject_name";

const EXAM_ORDER: &str =
  "ORDER BY date, CASE session WHEN 'FN' THEN 0 ELSE 1 END, subject_code";

fn student_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStudent> {
  Ok(RawStudent {
    reg_no:     row.get(0)?,
    name:       row.get(1)?,
    department: row.get(2)?,
    year:       row.get(3)?,
    subjects:   row.get(4)?,
  })
}

fn exam_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawExam> {
  Ok(RawExam {
    exam_id:      row.get(0)?,
    date:         row.get(1)?,
    session:      row.get(2)?,
    subject_code: row.get(3)?,
    subject_name: row.get(4)?,
  })
}

fn hall_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawHall> {
  Ok(RawHall {
    hall_id:  row.get(0)?,
    name:     row.get(1)?,
    capacity: row.get(2)?,
  })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` substring match.
fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

fn page_values(page: Page) -> [Value; 2] {
  [
    Value::Integer(i64::try_from(page.limit).unwrap_or(i64::MAX)),
    Value::Integer(i64::try_from(page.skip).unwrap_or(i64::MAX)),
  ]
}

fn to_i64(column: &'static str, value: u64) -> Result<i64> {
  i64::try_from(value).map_err(|_| Error::Corrupt { column, value: value.to_string() })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Seatplan roster store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RosterStore impl ────────────────────────────────────────────────────────

impl RosterStore for SqliteStore {
  type Error = Error;

  // ── Halls ─────────────────────────────────────────────────────────────────

  async fn add_hall(&self, input: NewHall) -> Result<Option<Hall>> {
    let input    = input.validate()?;
    let capacity = u32::try_from(input.capacity).map_err(|_| Error::Corrupt {
      column: "halls.capacity",
      value:  input.capacity.to_string(),
    })?;
    let name     = input.name.clone();

    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM halls WHERE name = ?1",
            rusqlite::params![name],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO halls (name, capacity) VALUES (?1, ?2)",
          rusqlite::params![name, capacity],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    Ok(inserted.map(|id| Hall { id, name: input.name, capacity }))
  }

  async fn get_hall(&self, id: HallId) -> Result<Option<Hall>> {
    let raw: Option<RawHall> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT hall_id, name, capacity FROM halls WHERE hall_id = ?1",
            rusqlite::params![id],
            hall_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawHall::into_hall).transpose()
  }

  async fn list_halls(&self) -> Result<Vec<Hall>> {
    let raws: Vec<RawHall> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT hall_id, name, capacity FROM halls ORDER BY hall_id")?;
        let rows = stmt
          .query_map([], hall_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHall::into_hall).collect()
  }

  async fn delete_hall(&self, id: HallId) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM halls WHERE hall_id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Students ──────────────────────────────────────────────────────────────

  async fn ingest_students(&self, students: Vec<Student>) -> Result<usize> {
    let saved = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut saved = 0;
        {
          let mut insert_student = tx.prepare(
            "INSERT OR IGNORE INTO students (reg_no, name, department, year)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          let mut insert_subject = tx.prepare(
            "INSERT OR IGNORE INTO student_subjects (reg_no, subject_code)
             VALUES (?1, ?2)",
          )?;
          for s in &students {
            let fresh = insert_student.execute(rusqlite::params![
              s.reg_no,
              s.name,
              s.department,
              s.year,
            ])?;
            if fresh == 0 {
              continue;
            }
            saved += 1;
            for code in &s.subjects_registered {
              insert_subject.execute(rusqlite::params![s.reg_no, code])?;
            }
          }
        }
        tx.commit()?;
        Ok(saved)
      })
      .await?;
    Ok(saved)
  }

  async fn get_student(&self, reg_no: &str) -> Result<Option<Student>> {
    let reg_no = reg_no.to_owned();

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students s WHERE s.reg_no = ?1");
        Ok(conn
          .query_row(&sql, rusqlite::params![reg_no], student_row)
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawStudent::into_student))
  }

  async fn list_students(&self) -> Result<Vec<Student>> {
    let raws: Vec<RawStudent> = self
      .conn
      .call(|conn| {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students s ORDER BY s.reg_no");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], student_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawStudent::into_student).collect())
  }

  async fn query_students(&self, query: &StudentQuery) -> Result<Vec<Student>> {
    // Build WHERE clause dynamically; parameters are positional.
    let mut conds: Vec<&'static str> = vec![];
    let mut values: Vec<Value> = vec![];

    if let Some(text) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      conds.push("(s.reg_no LIKE ? ESCAPE '\\' OR s.name LIKE ? ESCAPE '\\')");
      let pattern = like_pattern(text);
      values.push(Value::Text(pattern.clone()));
      values.push(Value::Text(pattern));
    }
    if let Some(dept) = query.department.as_deref().filter(|d| !d.is_empty()) {
      conds.push("s.department = ? COLLATE NOCASE");
      values.push(Value::Text(dept.to_owned()));
    }
    if let Some(code) = query.subject_code.as_deref().filter(|c| !c.is_empty()) {
      conds.push(
        "EXISTS (SELECT 1 FROM student_subjects ss
                  WHERE ss.reg_no = s.reg_no AND ss.subject_code = ? COLLATE NOCASE)",
      );
      values.push(Value::Text(code.to_owned()));
    }
    values.extend(page_values(query.page));

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {STUDENT_COLUMNS} FROM students s
           {where_clause}
           ORDER BY s.reg_no
           LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values), student_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawStudent::into_student).collect())
  }

  // ── Exams ─────────────────────────────────────────────────────────────────

  async fn ingest_exams(&self, exams: Vec<NewExam>) -> Result<usize> {
    let rows: Vec<(String, &'static str, String, String)> = exams
      .into_iter()
      .map(|e| {
        (encode_date(e.date), encode_session(e.session), e.subject_code, e.subject_name)
      })
      .collect();

    let saved = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut saved = 0;
        {
          let mut insert = tx.prepare(
            "INSERT OR IGNORE INTO exams (date, session, subject_code, subject_name)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (date, session, code, name) in &rows {
            saved += insert.execute(rusqlite::params![date, session, code, name])?;
          }
        }
        tx.commit()?;
        Ok(saved)
      })
      .await?;
    Ok(saved)
  }

  async fn list_exams(&self) -> Result<Vec<Exam>> {
    let raws: Vec<RawExam> = self
      .conn
      .call(|conn| {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams ORDER BY exam_id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], exam_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawExam::into_exam).collect()
  }

  async fn query_exams(&self, query: &ExamQuery) -> Result<Vec<Exam>> {
    let mut conds: Vec<&'static str> = vec![];
    let mut values: Vec<Value> = vec![];

    if let Some(code) = query.subject_code.as_deref().filter(|c| !c.is_empty()) {
      conds.push("subject_code = ? COLLATE NOCASE");
      values.push(Value::Text(code.to_owned()));
    }
    if let Some(session) = query.session {
      conds.push("session = ?");
      values.push(Value::Text(encode_session(session).to_owned()));
    }
    values.extend(page_values(query.page));

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let raws: Vec<RawExam> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {EXAM_COLUMNS} FROM exams
           {where_clause}
           {EXAM_ORDER}
           LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values), exam_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawExam::into_exam).collect()
  }

  // ── Committed plan ────────────────────────────────────────────────────────

  async fn save_plan(&self, plan: StoredPlan) -> Result<()> {
    let snapshot_id_str  = encode_uuid(plan.snapshot_id);
    let version          = to_i64("plan_meta.version", plan.version)?;
    let published_at_str = encode_dt(plan.published_at);
    let log_json         = encode_log(&plan.log)?;

    let mut rows = Vec::with_capacity(plan.allotments.len());
    for a in &plan.allotments {
      rows.push((
        to_i64("allotments.allotment_id", a.id)?,
        a.student_reg.clone(),
        a.exam_id,
        a.subject_code.clone(),
        a.hall_id,
        i64::from(a.seat_number),
        encode_date(a.date),
        encode_session(a.session),
        encode_placement(&a.placement)?,
      ));
    }

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM allotments", [])?;
        tx.execute("DELETE FROM plan_meta", [])?;
        tx.execute(
          "INSERT INTO plan_meta (singleton, snapshot_id, version, published_at, log_json)
           VALUES (1, ?1, ?2, ?3, ?4)",
          rusqlite::params![snapshot_id_str, version, published_at_str, log_json],
        )?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO allotments (
               allotment_id, student_reg, exam_id, subject_code, hall_id,
               seat_number, date, session, placement
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?;
          for row in &rows {
            insert.execute(rusqlite::params![
              row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_plan(&self) -> Result<Option<StoredPlan>> {
    type Meta = (String, i64, String, String);

    let loaded: Option<(Meta, Vec<RawAllotment>)> = self
      .conn
      .call(|conn| {
        let meta: Option<Meta> = conn
          .query_row(
            "SELECT snapshot_id, version, published_at, log_json
               FROM plan_meta WHERE singleton = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
          )
          .optional()?;

        let Some(meta) = meta else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT allotment_id, student_reg, exam_id, subject_code, hall_id,
                  seat_number, date, session, placement
             FROM allotments
            ORDER BY allotment_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawAllotment {
              allotment_id: row.get(0)?,
              student_reg:  row.get(1)?,
              exam_id:      row.get(2)?,
              subject_code: row.get(3)?,
              hall_id:      row.get(4)?,
              seat_number:  row.get(5)?,
              date:         row.get(6)?,
              session:      row.get(7)?,
              placement:    row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((meta, rows)))
      })
      .await?;

    let Some(((snapshot_id, version, published_at, log_json), raws)) = loaded else {
      return Ok(None);
    };

    let version = u64::try_from(version).map_err(|_| Error::Corrupt {
      column: "plan_meta.version",
      value:  version.to_string(),
    })?;
    let allotments = raws
      .into_iter()
      .map(RawAllotment::into_allotment)
      .collect::<Result<Vec<_>>>()?;

    Ok(Some(StoredPlan {
      snapshot_id: decode_uuid(&snapshot_id)?,
      version,
      published_at: decode_dt(&published_at)?,
      allotments,
      log: decode_log(&log_json)?,
    }))
  }
}
