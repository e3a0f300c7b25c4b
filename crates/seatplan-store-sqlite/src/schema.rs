//! SQL schema for the Seatplan SQLite store.
//!
//! Executed once at connection startup; `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS halls (
    hall_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL UNIQUE,
    capacity  INTEGER NOT NULL CHECK (capacity >= 1)
);

CREATE TABLE IF NOT EXISTS students (
    reg_no      TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    department  TEXT NOT NULL DEFAULT '',
    year        TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS student_subjects (
    reg_no        TEXT NOT NULL REFERENCES students(reg_no) ON DELETE CASCADE,
    subject_code  TEXT NOT NULL,
    PRIMARY KEY (reg_no, subject_code)
);

CREATE TABLE IF NOT EXISTS exams (
    exam_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    date          TEXT NOT NULL,   -- YYYY-MM-DD
    session       TEXT NOT NULL,   -- 'FN' | 'AN'
    subject_code  TEXT NOT NULL,
    subject_name  TEXT NOT NULL,
    UNIQUE (date, session, subject_code)
);

-- The committed plan. Replaced wholesale on every successful run; at most
-- one row lives in plan_meta.
CREATE TABLE IF NOT EXISTS plan_meta (
    singleton     INTEGER PRIMARY KEY CHECK (singleton = 1),
    snapshot_id   TEXT NOT NULL,
    version       INTEGER NOT NULL,
    published_at  TEXT NOT NULL,   -- RFC 3339 UTC
    log_json      TEXT NOT NULL    -- JSON array of log lines
);

CREATE TABLE IF NOT EXISTS allotments (
    allotment_id  INTEGER PRIMARY KEY,
    student_reg   TEXT NOT NULL,
    exam_id       INTEGER NOT NULL,
    subject_code  TEXT NOT NULL,
    hall_id       INTEGER NOT NULL,
    seat_number   INTEGER NOT NULL,
    date          TEXT NOT NULL,
    session       TEXT NOT NULL,
    placement     TEXT NOT NULL,   -- JSON-encoded Placement
    UNIQUE (hall_id, seat_number, date, session),
    UNIQUE (student_reg, exam_id)
);

CREATE INDEX IF NOT EXISTS student_subjects_code_idx ON student_subjects(subject_code);
CREATE INDEX IF NOT EXISTS students_department_idx   ON students(department);
CREATE INDEX IF NOT EXISTS exams_slot_idx            ON exams(date, session);

PRAGMA user_version = 1;
";
