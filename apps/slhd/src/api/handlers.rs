//! # API Endpoint Handlers
//!
//! Every handler takes the shared [`AppState`], reads the clock once and
//! hands the instant to the core. Failures become `(status, {"error"})`.

use super::{
    AppState,
    types::{
        DeadlineRequest, ErrorResponse, HealthResponse, LimitQuery, LogPageResponse, LogQuery,
        YearQuery, status_for,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{Datelike, Utc};
use slhd_core::primitives::{DEFAULT_RECENT_LIMIT, validate_year};
use slhd_core::{
    Actor, DashboardStats, Deadline, DeadlineView, RecentActivities, RequestMeta, Role, SlhdError,
    StageReport, Timeline, UserId, Year,
};
use std::sync::Arc;

/// Header carrying the acting user's id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the acting user's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

type Failure = (StatusCode, Json<ErrorResponse>);
type HandlerResult<T> = Result<(StatusCode, Json<T>), Failure>;

fn failure(error: &SlhdError) -> Failure {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::error!(event = "request_failed", "{}", error);
    }
    (status, Json(ErrorResponse::new(error.to_string())))
}

fn ok<T>(value: T) -> HandlerResult<T> {
    Ok((StatusCode::OK, Json(value)))
}

/// The requested year, or the current one.
fn resolve_year(year: Option<Year>) -> Result<Year, Failure> {
    validate_year(year.unwrap_or_else(|| Utc::now().year())).map_err(|e| failure(&e))
}

// =============================================================================
// REQUEST CONTEXT
// =============================================================================

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The acting user named by `X-Actor-Id` / `X-Actor-Role`.
///
/// Both absent means a system action. Only one of them, or either one
/// unparseable, is rejected.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Option<Actor>, SlhdError> {
    match (
        header_str(headers, ACTOR_ID_HEADER),
        header_str(headers, ACTOR_ROLE_HEADER),
    ) {
        (None, None) => Ok(None),
        (Some(id), Some(role)) => {
            let user_id = id
                .parse::<u64>()
                .map_err(|_| SlhdError::InvalidInput(format!("invalid actor id '{}'", id)))?;
            let role = role.parse::<Role>()?;
            Ok(Some(Actor {
                user_id: UserId(user_id),
                role,
            }))
        }
        _ => Err(SlhdError::InvalidInput(
            "X-Actor-Id and X-Actor-Role must be sent together".to_string(),
        )),
    }
}

/// Client address and agent for the audit trail.
///
/// The address is the first hop of `X-Forwarded-For`, else `X-Real-IP`.
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let ip_address = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::to_string);
    RequestMeta {
        ip_address,
        user_agent: header_str(headers, "user-agent").map(str::to_string),
    }
}

// =============================================================================
// HEALTH
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// DASHBOARD
// =============================================================================

/// `GET /dashboard/stats`, served from the per-year cache when enabled.
pub async fn dashboard_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> HandlerResult<DashboardStats> {
    let year = resolve_year(query.year)?;
    let compute = async {
        let session = state.session.read().await;
        session.dashboard_stats(year, Utc::now()).map(Arc::new)
    };

    let stats = match &state.dashboard_cache {
        Some(cache) => cache
            .try_get_with(year, compute)
            .await
            .map_err(|e| failure(&e))?,
        None => compute.await.map_err(|e| failure(&e))?,
    };
    ok(DashboardStats::clone(&stats))
}

/// `GET /dashboard/timeline`
pub async fn timeline_handler(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> HandlerResult<Timeline> {
    let year = resolve_year(query.year)?;
    let session = state.session.read().await;
    session
        .timeline(year, Utc::now())
        .map_err(|e| failure(&e))
        .and_then(ok)
}

/// `GET /dashboard/activities`
pub async fn activities_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> HandlerResult<RecentActivities> {
    let session = state.session.read().await;
    session
        .recent_activities(query.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .map_err(|e| failure(&e))
        .and_then(ok)
}

// =============================================================================
// STAGE & DEADLINE
// =============================================================================

/// `GET /stage/{year}`
pub async fn stage_handler(
    State(state): State<AppState>,
    Path(year): Path<Year>,
) -> HandlerResult<StageReport> {
    let year = resolve_year(Some(year))?;
    let session = state.session.read().await;
    session
        .stage_report(year, Utc::now())
        .map_err(|e| failure(&e))
        .and_then(ok)
}

/// `GET /deadline/{year}`
pub async fn deadline_handler(
    State(state): State<AppState>,
    Path(year): Path<Year>,
) -> HandlerResult<DeadlineView> {
    let year = resolve_year(Some(year))?;
    let session = state.session.read().await;
    session
        .deadline_view(year, Utc::now())
        .map_err(|e| failure(&e))
        .and_then(ok)
}

/// `POST /deadline`
///
/// Drops the cached dashboard for the year so the next read sees the
/// new deadline.
pub async fn set_deadline_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeadlineRequest>,
) -> HandlerResult<Deadline> {
    let actor = actor_from_headers(&headers).map_err(|e| failure(&e))?;
    let now = Utc::now();
    let update = request.into_update(now.year());

    let row = {
        let mut session = state.session.write().await;
        session
            .set_deadline(actor, &update, request_meta(&headers), now)
            .map_err(|e| failure(&e))?
    };

    if let Some(cache) = &state.dashboard_cache {
        cache.invalidate(&row.year).await;
    }
    ok(row)
}

// =============================================================================
// ACTIVITY LOGS
// =============================================================================

/// `GET /logs`
pub async fn logs_handler(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> HandlerResult<LogPageResponse> {
    list_logs(&state, query, None).await
}

/// `GET /logs/admin`
pub async fn admin_logs_handler(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> HandlerResult<LogPageResponse> {
    list_logs(&state, query, Some(Role::Admin.as_str())).await
}

/// `GET /logs/pusdatin`
pub async fn pusdatin_logs_handler(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> HandlerResult<LogPageResponse> {
    list_logs(&state, query, Some(Role::Pusdatin.as_str())).await
}

/// `GET /logs/tracking/{year}`
pub async fn tracking_logs_handler(
    State(state): State<AppState>,
    Path(year): Path<Year>,
    Query(query): Query<LogQuery>,
) -> HandlerResult<LogPageResponse> {
    let session = state.session.read().await;
    session
        .tracking_logs(year, query.page, query.limit)
        .map(LogPageResponse::from)
        .map_err(|e| failure(&e))
        .and_then(ok)
}

async fn list_logs(
    state: &AppState,
    query: LogQuery,
    role: Option<&str>,
) -> HandlerResult<LogPageResponse> {
    let filter = query.into_filter(role);
    let session = state.session.read().await;
    session
        .logs(&filter)
        .map(LogPageResponse::from)
        .map_err(|e| failure(&e))
        .and_then(ok)
}
