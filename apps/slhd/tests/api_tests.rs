//! Integration tests for the SLHD HTTP API.
//!
//! Uses axum-test to drive the router without binding a socket.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await - tests touching SLHD_API_KEY are
// serialized on purpose
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use slhd::api::{AppState, HealthResponse, LogPageResponse, create_router};
use slhd::config::ServerConfig;
use slhd_core::{
    Dinas, DinasId, DinasStatus, Evaluation, RegionType, Role, Session, Snapshot, StageStatus,
    Submission, SubmissionId, SubmissionStatus, User, UserId,
};
use std::sync::Mutex;

/// Serializes every test: the API key is process-wide.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

const API_KEY_ENV: &str = "SLHD_API_KEY";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var(API_KEY_ENV) };
    }
}

fn lock_env(api_key: Option<&str>) -> TestGuard {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe {
        match api_key {
            Some(key) => std::env::set_var(API_KEY_ENV, key),
            None => std::env::remove_var(API_KEY_ENV),
        }
    }
    TestGuard { _guard: guard }
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().unwrap()
}

fn test_config() -> ServerConfig {
    ServerConfig {
        rate_limit: 0,
        ..ServerConfig::default()
    }
}

/// Year 2026 at the SLHD scoring stage: 4 agencies, 3 accounts, 2 submissions.
fn seeded_session() -> Session {
    let dinas = (1..=4)
        .map(|id| Dinas {
            id: DinasId(id),
            name: format!("DLH {}", id),
            code: format!("{:02}", id),
            region_type: if id == 1 {
                RegionType::Provinsi
            } else {
                RegionType::Kabupaten
            },
            region_name: format!("Wilayah {}", id),
            status: DinasStatus::Terdaftar,
        })
        .collect();
    let users = vec![
        User {
            id: UserId(1),
            email: "admin@slhd.test".into(),
            role: Role::Admin,
            dinas_id: None,
            is_active: true,
            created_at: at(2025, 1, 1),
        },
        User {
            id: UserId(2),
            email: "prov@slhd.test".into(),
            role: Role::Provinsi,
            dinas_id: Some(DinasId(1)),
            is_active: true,
            created_at: at(2026, 1, 5),
        },
        User {
            id: UserId(3),
            email: "kab@slhd.test".into(),
            role: Role::KabupatenKota,
            dinas_id: Some(DinasId(2)),
            is_active: false,
            created_at: at(2026, 1, 9),
        },
    ];
    let submissions = vec![
        Submission {
            id: SubmissionId(1),
            dinas_id: DinasId(1),
            year: 2026,
            status: SubmissionStatus::Finalized,
            iklh_hundredths: Some(7250),
            created_at: at(2026, 1, 20),
        },
        Submission {
            id: SubmissionId(2),
            dinas_id: DinasId(2),
            year: 2026,
            status: SubmissionStatus::Draft,
            iklh_hundredths: None,
            created_at: at(2026, 1, 21),
        },
    ];
    let evaluations = (1..=4)
        .map(|id| Evaluation {
            year: 2026,
            dinas_id: DinasId(id),
            passed_screening: id <= 3,
            award_shortlist: false,
            passed_validation_1: false,
            passed_validation_2: false,
        })
        .collect();

    let mut session = Session::new();
    session
        .load_snapshot(&Snapshot {
            stage_statuses: vec![StageStatus {
                active_stage: "scoring_environmental_report".into(),
                ..StageStatus::default_for(2026)
            }],
            dinas,
            users,
            submissions,
            evaluations,
            ..Snapshot::default()
        })
        .unwrap();
    session
}

fn server_with(session: Session, config: ServerConfig) -> TestServer {
    TestServer::new(create_router(AppState::with_config(session, config))).unwrap()
}

fn create_test_server() -> (TestServer, TestGuard) {
    let guard = lock_env(None);
    (server_with(seeded_session(), test_config()), guard)
}

fn actor_headers(id: &'static str, role: &'static str) -> [(HeaderName, HeaderValue); 2] {
    [
        (
            HeaderName::from_static("x-actor-id"),
            HeaderValue::from_static(id),
        ),
        (
            HeaderName::from_static("x-actor-role"),
            HeaderValue::from_static(role),
        ),
    ]
}

async fn post_deadline(
    server: &TestServer,
    body: Value,
    headers: &[(HeaderName, HeaderValue)],
) -> axum_test::TestResponse {
    let mut request = server.post("/deadline").json(&body);
    for (name, value) in headers {
        request = request.add_header(name.clone(), value.clone());
    }
    request.await
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[tokio::test]
async fn test_dashboard_stats_for_year() {
    let (server, _guard) = create_test_server();

    let response = server.get("/dashboard/stats").add_query_param("year", 2026).await;

    response.assert_status_ok();
    let stats: Value = response.json();
    assert_eq!(stats["year"], 2026);
    assert_eq!(stats["users"]["total"], 3);
    assert_eq!(stats["users"]["active"], 2);
    assert_eq!(stats["users"]["pending_approval"], 1);
    assert_eq!(stats["users"]["by_role"]["dinas"], 2);
    assert_eq!(stats["submissions"]["total"], 2);
    assert_eq!(stats["submissions"]["finalized"], 1);
    assert_eq!(stats["timeline"]["active_stage"], "scoring_environmental_report");
    assert_eq!(stats["timeline"]["progress_percentage"], 29);
}

#[tokio::test]
async fn test_dashboard_stats_defaults_to_current_year() {
    let (server, _guard) = create_test_server();

    let response = server.get("/dashboard/stats").await;

    response.assert_status_ok();
    let stats: Value = response.json();
    assert_eq!(stats["year"], chrono::Datelike::year(&Utc::now()));
}

#[tokio::test]
async fn test_timeline_screening_statistics() {
    let (server, _guard) = create_test_server();

    let response = server
        .get("/dashboard/timeline")
        .add_query_param("year", 2026)
        .await;

    response.assert_status_ok();
    let timeline: Value = response.json();
    let entries = timeline["timeline"].as_array().unwrap();
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[0]["status"], "completed");
    assert_eq!(entries[1]["stage_id"], "scoring_environmental_report");
    assert_eq!(entries[1]["status"], "active");
    assert_eq!(entries[1]["statistics"]["total_evaluated"], 4);
    assert_eq!(entries[1]["statistics"]["passed"], 3);
    assert_eq!(entries[1]["statistics"]["not_passed"], 1);
    assert_eq!(entries[6]["status"], "pending");
}

#[tokio::test]
async fn test_recent_activities_limit() {
    let (server, _guard) = create_test_server();

    let response = server
        .get("/dashboard/activities")
        .add_query_param("limit", 2)
        .await;

    response.assert_status_ok();
    let feed: Value = response.json();
    let activities = feed["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 2);
    assert_eq!(feed["total"], 4);
    assert_eq!(activities[0]["type"], "submission");
    assert_eq!(activities[0]["dinas_name"], "DLH 2");
}

// =============================================================================
// STAGE & DEADLINE
// =============================================================================

#[tokio::test]
async fn test_stage_polling() {
    let (server, _guard) = create_test_server();

    let response = server.get("/stage/2026").await;

    response.assert_status_ok();
    let stage: Value = response.json();
    assert_eq!(stage["stage_id"], "scoring_environmental_report");
    assert_eq!(stage["rank"], 2);
    assert_eq!(stage["deadline"], Value::Null);
    assert_eq!(stage["is_passed"], false);
}

#[tokio::test]
async fn test_stage_for_unknown_year_defaults() {
    let (server, _guard) = create_test_server();

    let response = server.get("/stage/2030").await;

    response.assert_status_ok();
    let stage: Value = response.json();
    assert_eq!(stage["stage_id"], "submission");
    assert_eq!(stage["rank"], 1);
}

#[tokio::test]
async fn test_stage_rejects_out_of_range_year() {
    let (server, _guard) = create_test_server();

    server
        .get("/stage/1999")
        .expect_failure()
        .await
        .assert_status_bad_request();
    server
        .get("/stage/next")
        .expect_failure()
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_deadline_absent() {
    let (server, _guard) = create_test_server();

    let response = server.get("/deadline/2026").await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({"year": 2026, "deadline": null, "note": null, "is_passed": false})
    );
}

#[tokio::test]
async fn test_set_deadline_then_read_back() {
    let (server, _guard) = create_test_server();

    let response = post_deadline(
        &server,
        json!({
            "year": 2026,
            "deadline_at": "2099-03-01T00:00:00Z",
            "note": "Batas unggah dokumen"
        }),
        &actor_headers("1", "admin"),
    )
    .await;
    response.assert_status_ok();
    let row: Value = response.json();
    assert_eq!(row["stage"], "submission");
    assert_eq!(row["is_active"], true);

    let view: Value = server.get("/deadline/2026").await.json();
    assert_eq!(view["deadline"]["date"], "2099-03-01 00:00:00");
    assert_eq!(view["deadline"]["date_formatted"], "01 Maret 2099");
    assert_eq!(view["note"], "Batas unggah dokumen");
    assert_eq!(view["is_passed"], false);
}

#[tokio::test]
async fn test_set_deadline_past_instant_is_passed() {
    let (server, _guard) = create_test_server();

    post_deadline(
        &server,
        json!({"year": 2026, "deadline_at": "2020-01-01T00:00:00Z"}),
        &[],
    )
    .await
    .assert_status_ok();

    let view: Value = server.get("/deadline/2026").await.json();
    assert_eq!(view["is_passed"], true);
}

#[tokio::test]
async fn test_set_deadline_records_audit_entry() {
    let (server, _guard) = create_test_server();
    let mut headers = actor_headers("1", "admin").to_vec();
    headers.push((
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static("10.0.0.8, 172.16.0.1"),
    ));

    post_deadline(
        &server,
        json!({"year": 2026, "deadline_at": "2026-03-01T00:00:00Z"}),
        &headers,
    )
    .await
    .assert_status_ok();

    let page: LogPageResponse = server.get("/logs/admin").await.json();
    assert_eq!(page.total, 1);
    let entry = &page.data[0];
    assert_eq!(entry.action, "update_deadline");
    assert_eq!(
        entry.description,
        "Updated submission deadline for 2026 to 01 Mar 2026 00:00"
    );
    assert_eq!(entry.subject.kind, "none");
    assert_eq!(entry.year, Some(2026));
    assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.8"));

    let pusdatin: LogPageResponse = server.get("/logs/pusdatin").await.json();
    assert_eq!(pusdatin.total, 0);
}

#[tokio::test]
async fn test_set_deadline_rejects_partial_actor() {
    let (server, _guard) = create_test_server();

    let response = post_deadline(
        &server,
        json!({"year": 2026, "deadline_at": "2026-03-01T00:00:00Z"}),
        &actor_headers("1", "admin")[..1],
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("X-Actor-Id"));
}

#[tokio::test]
async fn test_set_deadline_rejects_out_of_range_year() {
    let (server, _guard) = create_test_server();

    let response = post_deadline(
        &server,
        json!({"year": 2200, "deadline_at": "2026-03-01T00:00:00Z"}),
        &[],
    )
    .await;

    response.assert_status_bad_request();
    let logs: LogPageResponse = server.get("/logs").await.json();
    assert_eq!(logs.total, 0);
}

#[tokio::test]
async fn test_set_deadline_refreshes_cached_dashboard() {
    let _guard = lock_env(None);
    let server = server_with(seeded_session(), test_config());

    let before: Value = server
        .get("/dashboard/stats")
        .add_query_param("year", 2026)
        .await
        .json();
    assert_eq!(before["timeline"]["timeline"][0]["deadline"], Value::Null);

    post_deadline(
        &server,
        json!({"year": 2026, "deadline_at": "2026-03-01T00:00:00Z"}),
        &[],
    )
    .await
    .assert_status_ok();

    let after: Value = server
        .get("/dashboard/stats")
        .add_query_param("year", 2026)
        .await
        .json();
    assert_eq!(
        after["timeline"]["timeline"][0]["deadline"]["date_formatted"],
        "01 Maret 2026"
    );
}

// =============================================================================
// ACTIVITY LOGS
// =============================================================================

#[tokio::test]
async fn test_logs_pagination_and_tracking() {
    let (server, _guard) = create_test_server();

    for (year, day) in [(2025, "01"), (2026, "02"), (2026, "03")] {
        post_deadline(
            &server,
            json!({"year": year, "deadline_at": format!("{}-03-{}T00:00:00Z", year, day)}),
            &actor_headers("7", "pusdatin"),
        )
        .await
        .assert_status_ok();
    }

    let page: LogPageResponse = server
        .get("/logs")
        .add_query_param("role", "pusdatin")
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(page.total, 3);
    assert_eq!(page.per_page, 2);
    assert_eq!(page.last_page, 2);
    assert_eq!(page.data.len(), 2);
    assert!(page.data[0].id > page.data[1].id);

    let tracking: LogPageResponse = server.get("/logs/tracking/2025").await.json();
    assert_eq!(tracking.total, 1);
    assert_eq!(tracking.data[0].year, Some(2025));
}

// =============================================================================
// AUTHENTICATION & RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_auth_health_is_open() {
    let _guard = lock_env(Some("test-secret-key-12345"));
    let server = server_with(Session::new(), test_config());

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let _guard = lock_env(Some("test-secret-key-12345"));
    let server = server_with(Session::new(), test_config());

    server
        .get("/stage/2026")
        .expect_failure()
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_auth_wrong_key_rejected() {
    let _guard = lock_env(Some("test-secret-key-12345"));
    let server = server_with(Session::new(), test_config());

    server
        .get("/stage/2026")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer wrong-key"),
        )
        .expect_failure()
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let _guard = lock_env(Some("test-secret-key-12345"));
    let server = server_with(Session::new(), test_config());

    server
        .get("/stage/2026")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer test-secret-key-12345"),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_exceeded() {
    let _guard = lock_env(None);
    let config = ServerConfig {
        rate_limit: 1,
        ..ServerConfig::default()
    };
    let server = server_with(Session::new(), config);

    server.get("/health").await.assert_status_ok();
    server
        .get("/health")
        .expect_failure()
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}
