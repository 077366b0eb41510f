//! # API Request/Response Types
//!
//! JSON shapes of the admin API that differ from the core types.
//! Timelines, stage reports, dashboard snapshots and deadline views are
//! served as the core serialises them.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slhd_core::primitives::SUBMISSION_STAGE_TAG;
use slhd_core::{
    ActivityLog, Actor, DeadlineUpdate, LogContext, LogFilter, Page, SlhdError, Subject, Year,
};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// HTTP status for a core error.
pub fn status_for(error: &SlhdError) -> StatusCode {
    match error {
        SlhdError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SlhdError::NotFound(_) => StatusCode::NOT_FOUND,
        SlhdError::StorageUnavailable(_) | SlhdError::Serialization(_) | SlhdError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// QUERY STRINGS
// =============================================================================

/// `?year=`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<Year>,
}

/// `?limit=`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// `?role=&year=&page=&limit=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub role: Option<String>,
    pub year: Option<Year>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl LogQuery {
    /// Filter for this query, with `role` forced when given.
    pub fn into_filter(self, role: Option<&str>) -> LogFilter {
        LogFilter {
            role: role.map(str::to_string).or(self.role),
            year: self.year,
            page: self.page,
            limit: self.limit,
        }
    }
}

// =============================================================================
// DEADLINE REQUEST
// =============================================================================

fn submission_stage() -> String {
    SUBMISSION_STAGE_TAG.to_string()
}

/// Body of `POST /deadline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineRequest {
    /// Defaults to the current year.
    #[serde(default)]
    pub year: Option<Year>,
    #[serde(default = "submission_stage")]
    pub stage: String,
    pub deadline_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

impl DeadlineRequest {
    /// Convert to a core update, filling in the year.
    ///
    /// A blank stage or note counts as absent.
    pub fn into_update(self, current_year: Year) -> DeadlineUpdate {
        let stage = match self.stage.trim() {
            "" => submission_stage(),
            s => s.to_string(),
        };
        DeadlineUpdate {
            year: self.year.unwrap_or(current_year),
            stage,
            deadline_at: self.deadline_at,
            note: self.note.filter(|n| !n.trim().is_empty()),
        }
    }
}

// =============================================================================
// ACTIVITY LOG RESPONSE
// =============================================================================

/// The affected record of a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectJson {
    pub kind: String,
    pub id: Option<u64>,
}

impl From<Subject> for SubjectJson {
    fn from(subject: Subject) -> Self {
        let (kind, id) = subject.parts();
        Self {
            kind: kind.to_string(),
            id,
        }
    }
}

/// One activity log entry as served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryJson {
    pub id: u64,
    pub actor: Option<Actor>,
    pub action: String,
    pub description: String,
    pub subject: SubjectJson,
    pub context: LogContext,
    pub year: Option<Year>,
    pub stage: Option<String>,
    pub document_type: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityLog> for LogEntryJson {
    fn from(log: ActivityLog) -> Self {
        Self {
            id: log.id.0,
            actor: log.actor,
            action: log.action,
            description: log.description,
            subject: log.subject.into(),
            context: log.context,
            year: log.year,
            stage: log.stage,
            document_type: log.document_type,
            properties: log.properties,
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            created_at: log.created_at,
        }
    }
}

/// A page of log entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPageResponse {
    pub data: Vec<LogEntryJson>,
    pub current_page: usize,
    pub per_page: usize,
    pub total: usize,
    pub last_page: usize,
}

impl From<Page<ActivityLog>> for LogPageResponse {
    fn from(page: Page<ActivityLog>) -> Self {
        Self {
            data: page.data.into_iter().map(LogEntryJson::from).collect(),
            current_page: page.current_page,
            per_page: page.per_page,
            total: page.total,
            last_page: page.last_page,
        }
    }
}
