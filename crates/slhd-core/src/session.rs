//! # Session Module
//!
//! The single entry point the CLI and HTTP layers talk to.
//!
//! A session owns one storage backend and exposes every program operation
//! on top of it: stage polling, timeline projection, deadline management,
//! dashboard aggregation, audit logging and snapshot loading.
//!
//! ## Storage Backends
//!
//! - `InMemory`: a [`MemoryStore`] (fast, volatile)
//! - `Persistent`: a [`RedbStore`] for disk-backed ACID storage
//!
//! The clock is always passed in; nothing here reads the system time.

use crate::audit::{
    ActivityDraft, ActivityLog, Actor, LogFilter, Page, RequestMeta, query_logs, record,
};
use crate::dashboard::{DashboardStats, RecentActivities, dashboard_stats, recent_activities};
use crate::formats::{Snapshot, SnapshotReport};
use crate::pipeline::{
    Deadline, DeadlineStore, DeadlineUpdate, DeadlineView, StageLedger, StageReport, StageStatus,
    Timeline, TimelineProjector,
};
use crate::primitives::{SUBMISSION_STAGE_TAG, validate_year};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, RecordSink};
use crate::{SlhdError, Year};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
enum StorageBackend {
    /// In-memory maps (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// A session over one program store.
///
/// Does not implement Clone: the redb handle cannot be shared safely.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, SlhdError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    // =========================================================================
    // STAGE & TIMELINE
    // =========================================================================

    /// The stage record for `year`, defaulted when absent.
    pub fn current_stage(&self, year: Year) -> Result<StageStatus, SlhdError> {
        match &self.backend {
            StorageBackend::InMemory(store) => store.current_stage(year),
            StorageBackend::Persistent(store) => store.current_stage(year),
        }
    }

    /// Stage polling: the active stage plus its deadline state.
    pub fn stage_report(&self, year: Year, now: DateTime<Utc>) -> Result<StageReport, SlhdError> {
        let projector = TimelineProjector::new();
        match &self.backend {
            StorageBackend::InMemory(store) => projector.stage_report(store, year, now),
            StorageBackend::Persistent(store) => projector.stage_report(store, year, now),
        }
    }

    /// The seven-stage timeline for `year`.
    pub fn timeline(&self, year: Year, now: DateTime<Utc>) -> Result<Timeline, SlhdError> {
        let projector = TimelineProjector::new();
        match &self.backend {
            StorageBackend::InMemory(store) => projector.project(store, year, now),
            StorageBackend::Persistent(store) => projector.project(store, year, now),
        }
    }

    // =========================================================================
    // DEADLINES
    // =========================================================================

    /// The submission deadline of `year`.
    pub fn deadline_view(
        &self,
        year: Year,
        now: DateTime<Utc>,
    ) -> Result<DeadlineView, SlhdError> {
        let row = match &self.backend {
            StorageBackend::InMemory(store) => store.active_deadline(year, SUBMISSION_STAGE_TAG)?,
            StorageBackend::Persistent(store) => {
                store.active_deadline(year, SUBMISSION_STAGE_TAG)?
            }
        };
        Ok(DeadlineView::new(year, row.as_ref(), now))
    }

    /// Upsert a deadline and record who did it.
    ///
    /// The audit entry is best effort: a failed log write is reported
    /// through tracing and the stored deadline is still returned.
    pub fn set_deadline(
        &mut self,
        actor: Option<Actor>,
        update: &DeadlineUpdate,
        meta: RequestMeta,
        now: DateTime<Utc>,
    ) -> Result<Deadline, SlhdError> {
        let row = match &mut self.backend {
            StorageBackend::InMemory(store) => store.upsert_deadline(update, now)?,
            StorageBackend::Persistent(store) => store.upsert_deadline(update, now)?,
        };
        tracing::info!(
            event = "deadline_updated",
            year = row.year,
            stage = %row.stage,
            deadline_id = row.id.0
        );

        let draft = ActivityDraft::new(
            actor,
            "update_deadline",
            format!(
                "Updated {} deadline for {} to {}",
                row.stage,
                row.year,
                row.deadline_at.format("%d %b %Y %H:%M")
            ),
        )
        .property("year", row.year)
        .meta(meta);
        self.record_activity(draft, now);
        Ok(row)
    }

    // =========================================================================
    // DASHBOARD
    // =========================================================================

    pub fn dashboard_stats(
        &self,
        year: Year,
        now: DateTime<Utc>,
    ) -> Result<DashboardStats, SlhdError> {
        match &self.backend {
            StorageBackend::InMemory(store) => dashboard_stats(store, year, now),
            StorageBackend::Persistent(store) => dashboard_stats(store, year, now),
        }
    }

    /// `limit` is clamped to 1..=100.
    pub fn recent_activities(&self, limit: usize) -> Result<RecentActivities, SlhdError> {
        match &self.backend {
            StorageBackend::InMemory(store) => recent_activities(store, limit),
            StorageBackend::Persistent(store) => recent_activities(store, limit),
        }
    }

    // =========================================================================
    // AUDIT
    // =========================================================================

    /// Append an audit entry. Failures are logged, never returned.
    pub fn record_activity(
        &mut self,
        draft: ActivityDraft,
        now: DateTime<Utc>,
    ) -> Option<ActivityLog> {
        match &mut self.backend {
            StorageBackend::InMemory(store) => record(store, draft, now),
            StorageBackend::Persistent(store) => record(store, draft, now),
        }
    }

    pub fn logs(&self, filter: &LogFilter) -> Result<Page<ActivityLog>, SlhdError> {
        match &self.backend {
            StorageBackend::InMemory(store) => query_logs(store, filter),
            StorageBackend::Persistent(store) => query_logs(store, filter),
        }
    }

    /// Tracking history: every log entry of one year.
    pub fn tracking_logs(
        &self,
        year: Year,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<Page<ActivityLog>, SlhdError> {
        validate_year(year)?;
        self.logs(&LogFilter {
            role: None,
            year: Some(year),
            page,
            limit,
        })
    }

    // =========================================================================
    // DATA LOADING
    // =========================================================================

    /// Load a snapshot into the backend.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<SnapshotReport, SlhdError> {
        let report = match &mut self.backend {
            StorageBackend::InMemory(store) => store.load_snapshot(snapshot)?,
            StorageBackend::Persistent(store) => store.load_snapshot(snapshot)?,
        };
        tracing::info!(event = "snapshot_loaded", records = report.total());
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
