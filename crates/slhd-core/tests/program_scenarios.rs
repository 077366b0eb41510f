//! # Program Scenarios
//!
//! End-to-end checks through `Session`, run against both backends.

use chrono::{DateTime, TimeZone, Utc};
use slhd_core::pipeline::StageStatistics;
use slhd_core::{
    Actor, Deadline, DeadlineId, DeadlineUpdate, Dinas, DinasId, DinasStatus, Evaluation,
    LogFilter, RegionType, RequestMeta, Role, Session, Snapshot, Stage, StageState, StageStatus,
    UserId,
};
use tempfile::tempdir;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .expect("valid date")
}

/// Year 2026 at validation_1 with 80 evaluated agencies.
fn validation_snapshot() -> Snapshot {
    let dinas = (1..=80)
        .map(|id| Dinas {
            id: DinasId(id),
            name: format!("DLH {}", id),
            code: format!("{:04}", id),
            region_type: if id % 2 == 0 {
                RegionType::Kota
            } else {
                RegionType::Kabupaten
            },
            region_name: format!("Wilayah {}", id),
            status: DinasStatus::Terdaftar,
        })
        .collect();
    let evaluations = (1..=80)
        .map(|id| Evaluation {
            year: 2026,
            dinas_id: DinasId(id),
            passed_screening: id <= 50,
            award_shortlist: id <= 30,
            passed_validation_1: id <= 20,
            passed_validation_2: false,
        })
        .collect();
    Snapshot {
        stage_statuses: vec![StageStatus {
            active_stage: "validation_1".into(),
            ..StageStatus::default_for(2026)
        }],
        deadlines: vec![Deadline {
            id: DeadlineId(1),
            year: 2026,
            stage: "submission".into(),
            deadline_at: at(2026, 3, 1),
            note: None,
            is_active: true,
            updated_at: at(2026, 1, 1),
        }],
        dinas,
        evaluations,
        ..Snapshot::default()
    }
}

fn check_validation_scenario(session: &mut Session) {
    session
        .load_snapshot(&validation_snapshot())
        .expect("load snapshot");

    let timeline = session.timeline(2026, at(2026, 4, 1)).expect("timeline");
    assert_eq!(timeline.progress_percentage, 57);
    assert_eq!(timeline.summary.total_registered_agencies, 80);

    let v1 = timeline.entry(Stage::Validation1).expect("validation_1");
    assert_eq!(v1.status, StageState::Active);
    assert_eq!(
        v1.statistics,
        Some(StageStatistics::Validation {
            total_participants: 30,
            passed: 20,
            not_passed: 10,
        })
    );
    assert_eq!(
        timeline.entry(Stage::ScoringAward).map(|e| e.status),
        Some(StageState::Completed)
    );
    assert_eq!(
        timeline.entry(Stage::Interview).map(|e| e.status),
        Some(StageState::Pending)
    );

    let deadline = timeline
        .entry(Stage::Submission)
        .and_then(|e| e.deadline.clone())
        .expect("submission deadline");
    assert!(deadline.is_passed);
    assert_eq!(deadline.date_formatted, "01 Maret 2026");
}

#[test]
fn validation_scenario_in_memory() {
    check_validation_scenario(&mut Session::new());
}

#[test]
fn validation_scenario_persistent() {
    let temp = tempdir().expect("temp dir");
    let mut session = Session::with_redb(temp.path().join("slhd.db")).expect("open");
    assert!(session.is_persistent());
    check_validation_scenario(&mut session);
}

#[test]
fn year_without_record_defaults() {
    let session = Session::new();
    let report = session.stage_report(2030, at(2030, 1, 1)).expect("report");
    assert_eq!(report.stage_id, "submission");
    assert_eq!(report.rank, 1);
    assert!(!report.announcement_open);
    assert_eq!(report.note, "awaiting process start");
    assert!(report.deadline.is_none());
    assert!(!report.is_passed);
}

#[test]
fn deadline_passes_strictly_after_instant() {
    let mut session = Session::new();
    let update = DeadlineUpdate {
        year: 2026,
        stage: "submission".into(),
        deadline_at: at(2026, 3, 1),
        note: None,
    };
    session
        .set_deadline(None, &update, RequestMeta::default(), at(2026, 1, 1))
        .expect("set");

    assert!(!session.deadline_view(2026, at(2026, 3, 1)).expect("view").is_passed);
    assert!(session.deadline_view(2026, at(2026, 4, 1)).expect("view").is_passed);
    assert!(!session.deadline_view(2027, at(2027, 4, 1)).expect("view").is_passed);
}

#[test]
fn stage_polling_uses_active_stage_deadline() {
    let temp = tempdir().expect("temp dir");
    let mut session = Session::with_redb(temp.path().join("slhd.db")).expect("open");
    session
        .load_snapshot(&validation_snapshot())
        .expect("load snapshot");
    let actor = Actor {
        user_id: UserId(1),
        role: Role::Admin,
    };
    session
        .set_deadline(
            Some(actor),
            &DeadlineUpdate {
                year: 2026,
                stage: "validation_1".into(),
                deadline_at: at(2026, 7, 1),
                note: Some("Validasi berkas".into()),
            },
            RequestMeta {
                ip_address: Some("10.0.0.8".into()),
                user_agent: None,
            },
            at(2026, 5, 1),
        )
        .expect("set");

    let report = session.stage_report(2026, at(2026, 6, 1)).expect("report");
    assert_eq!(report.stage_id, "validation_1");
    assert!(report.deadline.is_some());
    assert!(!report.is_passed);

    let logs = session.logs(&LogFilter::for_role("admin")).expect("logs");
    assert_eq!(logs.total, 1);
    assert_eq!(logs.data[0].ip_address.as_deref(), Some("10.0.0.8"));
    // Upserting validation_1 leaves the submission row alone.
    assert_eq!(
        session
            .deadline_view(2026, at(2026, 6, 1))
            .expect("view")
            .deadline
            .map(|d| d.date),
        Some("2026-03-01 00:00:00".to_string())
    );
}

#[test]
fn persistent_session_survives_reopen() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("slhd.db");
    {
        let mut session = Session::with_redb(&path).expect("open");
        session
            .load_snapshot(&validation_snapshot())
            .expect("load snapshot");
    }
    let session = Session::with_redb(&path).expect("reopen");
    assert_eq!(
        session.current_stage(2026).expect("stage").active_stage,
        "validation_1"
    );
}
