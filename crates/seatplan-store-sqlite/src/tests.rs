//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, TimeZone, Utc};
use seatplan_core::{
  model::{Allotment, NewExam, NewHall, NewStudent, Placement, Session, Student},
  plan::StoredPlan,
  store::{ExamQuery, Page, RosterStore, StudentQuery},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

fn student(reg_no: &str, name: &str, dept: &str, subjects: &[&str]) -> Student {
  NewStudent {
    reg_no:              reg_no.into(),
    name:                name.into(),
    department:          dept.into(),
    year:                "III".into(),
    subjects_registered: subjects.iter().map(|s| s.to_string()).collect(),
  }
  .validate()
  .unwrap()
}

fn exam(day: &str, session: Session, code: &str) -> NewExam {
  NewExam {
    date:         date(day),
    session,
    subject_code: code.into(),
    subject_name: format!("{code} paper"),
  }
}

// ─── Halls ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_list_halls_in_id_order() {
  let s = store().await;
  let a = s.add_hall(NewHall { name: "Main".into(), capacity: 30 }).await.unwrap().unwrap();
  let b = s.add_hall(NewHall { name: "Annex".into(), capacity: 12 }).await.unwrap().unwrap();
  assert!(a.id < b.id);

  let halls = s.list_halls().await.unwrap();
  let names: Vec<&str> = halls.iter().map(|h| h.name.as_str()).collect();
  assert_eq!(names, ["Main", "Annex"]);
  assert_eq!(halls[1].capacity, 12);

  let fetched = s.get_hall(a.id).await.unwrap().unwrap();
  assert_eq!(fetched, a);
}

#[tokio::test]
async fn duplicate_hall_name_is_not_stored() {
  let s = store().await;
  s.add_hall(NewHall { name: "Main".into(), capacity: 30 }).await.unwrap().unwrap();
  let second = s
    .add_hall(NewHall { name: "Main".into(), capacity: 5 })
    .await
    .unwrap();
  assert!(second.is_none());
  let halls = s.list_halls().await.unwrap();
  assert_eq!(halls.len(), 1);
  assert_eq!(halls[0].capacity, 30);
}

#[tokio::test]
async fn invalid_hall_capacity_errors() {
  let s = store().await;
  let err = s
    .add_hall(NewHall { name: "Broom cupboard".into(), capacity: 0 })
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::Core(_)));
  assert!(s.list_halls().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_hall_reports_whether_it_existed() {
  let s = store().await;
  let hall = s.add_hall(NewHall { name: "Main".into(), capacity: 30 }).await.unwrap().unwrap();
  assert!(s.delete_hall(hall.id).await.unwrap());
  assert!(!s.delete_hall(hall.id).await.unwrap());
  assert!(s.get_hall(hall.id).await.unwrap().is_none());
}

// ─── Students ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_students_skips_existing_reg_nos() {
  let s = store().await;
  let saved = s
    .ingest_students(vec![
      student("2002", "Bala", "ECE", &["EC201"]),
      student("2001", "Asha", "CSE", &["CS101", "MA101"]),
    ])
    .await
    .unwrap();
  assert_eq!(saved, 2);

  let again = s
    .ingest_students(vec![
      student("2001", "Someone Else", "MECH", &[]),
      student("2003", "Chitra", "CSE", &["CS101"]),
    ])
    .await
    .unwrap();
  assert_eq!(again, 1);

  let asha = s.get_student("2001").await.unwrap().unwrap();
  assert_eq!(asha.name, "Asha");
  assert!(asha.is_registered_for("MA101"));
  assert_eq!(asha.subjects_registered.len(), 2);

  let all = s.list_students().await.unwrap();
  let regs: Vec<&str> = all.iter().map(|st| st.reg_no.as_str()).collect();
  assert_eq!(regs, ["2001", "2002", "2003"]);
}

#[tokio::test]
async fn get_student_missing_returns_none() {
  let s = store().await;
  assert!(s.get_student("9999").await.unwrap().is_none());
}

#[tokio::test]
async fn student_without_subjects_roundtrips() {
  let s = store().await;
  s.ingest_students(vec![student("2001", "Asha", "CSE", &[])]).await.unwrap();
  let asha = s.get_student("2001").await.unwrap().unwrap();
  assert!(asha.subjects_registered.is_empty());
}

#[tokio::test]
async fn query_students_filters_and_paginates() {
  let s = store().await;
  s.ingest_students(vec![
    student("2001", "Asha", "CSE", &["CS101"]),
    student("2002", "Bala", "ECE", &["EC201"]),
    student("2003", "Ashwin", "CSE", &["CS101", "MA101"]),
    student("2004", "Divya", "CSE", &["MA101"]),
  ])
  .await
  .unwrap();

  let by_name = s
    .query_students(&StudentQuery { search: Some("ash".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_name.len(), 2);

  let by_reg = s
    .query_students(&StudentQuery { search: Some("004".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_reg[0].name, "Divya");

  let cse_math = s
    .query_students(&StudentQuery {
      department: Some("cse".into()),
      subject_code: Some("MA101".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  let regs: Vec<&str> = cse_math.iter().map(|st| st.reg_no.as_str()).collect();
  assert_eq!(regs, ["2003", "2004"]);

  let second_page = s
    .query_students(&StudentQuery { page: Page { skip: 2, limit: 2 }, ..Default::default() })
    .await
    .unwrap();
  let regs: Vec<&str> = second_page.iter().map(|st| st.reg_no.as_str()).collect();
  assert_eq!(regs, ["2003", "2004"]);
}

#[tokio::test]
async fn student_search_treats_wildcards_literally() {
  let s = store().await;
  s.ingest_students(vec![student("2001", "Asha", "CSE", &[])]).await.unwrap();
  let none = s
    .query_students(&StudentQuery { search: Some("%".into()), ..Default::default() })
    .await
    .unwrap();
  assert!(none.is_empty());
}

// ─── Exams ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_exams_dedupes_on_slot_and_code() {
  let s = store().await;
  let saved = s
    .ingest_exams(vec![
      exam("2024-11-20", Session::Forenoon, "CS101"),
      exam("2024-11-20", Session::Afternoon, "CS101"),
      exam("2024-11-20", Session::Forenoon, "CS101"),
    ])
    .await
    .unwrap();
  assert_eq!(saved, 2);
  assert_eq!(s.list_exams().await.unwrap().len(), 2);
}

#[tokio::test]
async fn query_exams_orders_forenoon_before_afternoon() {
  let s = store().await;
  s.ingest_exams(vec![
    exam("2024-11-21", Session::Forenoon, "MA101"),
    exam("2024-11-20", Session::Afternoon, "CS101"),
    exam("2024-11-20", Session::Forenoon, "EC201"),
  ])
  .await
  .unwrap();

  let all = s.query_exams(&ExamQuery::default()).await.unwrap();
  let codes: Vec<&str> = all.iter().map(|e| e.subject_code.as_str()).collect();
  assert_eq!(codes, ["EC201", "CS101", "MA101"]);

  let afternoon = s
    .query_exams(&ExamQuery { session: Some(Session::Afternoon), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(afternoon.len(), 1);
  assert_eq!(afternoon[0].subject_code, "CS101");
  assert_eq!(afternoon[0].subject_name, "CS101 paper");

  let by_code = s
    .query_exams(&ExamQuery { subject_code: Some("ma101".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_code[0].date, date("2024-11-21"));
}

// ─── Plan ────────────────────────────────────────────────────────────────────

fn allotment(id: u64, reg: &str, seat: u32, placement: Placement) -> Allotment {
  Allotment {
    id,
    student_reg: reg.into(),
    exam_id: 1,
    subject_code: "CS101".into(),
    hall_id: 1,
    seat_number: seat,
    date: date("2024-11-20"),
    session: Session::Forenoon,
    placement,
  }
}

fn plan(version: u64, allotments: Vec<Allotment>) -> StoredPlan {
  StoredPlan {
    snapshot_id: Uuid::new_v4(),
    version,
    published_at: Utc.with_ymd_and_hms(2024, 11, 1, 9, 0, 0).unwrap(),
    allotments,
    log: vec!["line one".into(), "line two".into()],
  }
}

#[tokio::test]
async fn load_plan_is_none_before_first_save() {
  let s = store().await;
  assert!(s.load_plan().await.unwrap().is_none());
}

#[tokio::test]
async fn save_and_load_plan_roundtrip() {
  let s = store().await;
  let saved = plan(3, vec![
    allotment(1, "2001", 1, Placement::Clean),
    allotment(2, "2002", 2, Placement::Warned { conflicts: vec!["2001".into()] }),
  ]);
  s.save_plan(saved.clone()).await.unwrap();

  let loaded = s.load_plan().await.unwrap().unwrap();
  assert_eq!(loaded.snapshot_id, saved.snapshot_id);
  assert_eq!(loaded.version, 3);
  assert_eq!(loaded.published_at, saved.published_at);
  assert_eq!(loaded.allotments, saved.allotments);
  assert_eq!(loaded.log, saved.log);
}

#[tokio::test]
async fn save_plan_replaces_previous_plan_wholesale() {
  let s = store().await;
  s.save_plan(plan(1, vec![
    allotment(1, "2001", 1, Placement::Clean),
    allotment(2, "2002", 3, Placement::Clean),
  ]))
  .await
  .unwrap();
  s.save_plan(plan(2, vec![allotment(1, "2003", 2, Placement::Clean)]))
    .await
    .unwrap();

  let loaded = s.load_plan().await.unwrap().unwrap();
  assert_eq!(loaded.version, 2);
  assert_eq!(loaded.allotments.len(), 1);
  assert_eq!(loaded.allotments[0].student_reg, "2003");
}

#[tokio::test]
async fn save_plan_rejects_double_booked_seat() {
  let s = store().await;
  s.save_plan(plan(1, vec![allotment(1, "2001", 1, Placement::Clean)]))
    .await
    .unwrap();

  let clash = plan(2, vec![
    allotment(1, "2002", 4, Placement::Clean),
    allotment(2, "2003", 4, Placement::Clean),
  ]);
  assert!(s.save_plan(clash).await.is_err());

  // The failed transaction leaves the earlier plan in place.
  let loaded = s.load_plan().await.unwrap().unwrap();
  assert_eq!(loaded.version, 1);
  assert_eq!(loaded.allotments[0].student_reg, "2001");
}
