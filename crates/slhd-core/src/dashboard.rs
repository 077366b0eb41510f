//! # Dashboard Aggregation
//!
//! Account statistics, yearly submission statistics and the recent-activity
//! feed shown next to the timeline on the admin dashboard.

use crate::pipeline::{SubmissionAggregate, Timeline, TimelineProjector, TimelineSource};
use crate::primitives::MAX_PAGE_SIZE;
use crate::{
    DinasId, RegionType, Role, SlhdError, SubmissionId, SubmissionStatus, User, UserId, Year,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read access to user accounts.
pub trait UserStore {
    fn users(&self) -> Result<Vec<User>, SlhdError>;

    /// Newest accounts first.
    fn recent_users(&self, limit: usize) -> Result<Vec<User>, SlhdError> {
        let mut users = self.users()?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        users.truncate(limit);
        Ok(users)
    }
}

/// Everything the dashboard reads from.
pub trait DashboardSource: TimelineSource + UserStore {}

impl<T> DashboardSource for T where T: TimelineSource + UserStore + ?Sized {}

// =============================================================================
// STATISTICS
// =============================================================================

/// Users by role; `dinas` counts both agency roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleCounts {
    pub admin: u64,
    pub pusdatin: u64,
    pub dinas: u64,
}

/// Dinas accounts by the level of their agency's region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DinasTypeCounts {
    pub provinsi: u64,
    pub kabupaten_kota: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub total: u64,
    pub pending_approval: u64,
    pub active: u64,
    pub by_role: RoleCounts,
    pub dinas_by_type: DinasTypeCounts,
}

/// The full dashboard snapshot for a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub year: Year,
    pub users: UserStats,
    pub submissions: SubmissionAggregate,
    pub timeline: Timeline,
    pub generated_at: DateTime<Utc>,
}

/// Count accounts. Dinas accounts are grouped by their agency's region;
/// accounts whose agency is unknown are left out of that grouping.
pub fn user_stats<S: DashboardSource + ?Sized>(source: &S) -> Result<UserStats, SlhdError> {
    let mut stats = UserStats::default();
    for user in source.users()? {
        stats.total += 1;
        if user.is_active {
            stats.active += 1;
        } else {
            stats.pending_approval += 1;
        }
        match user.role {
            Role::Admin => stats.by_role.admin += 1,
            Role::Pusdatin => stats.by_role.pusdatin += 1,
            Role::Provinsi | Role::KabupatenKota => {
                stats.by_role.dinas += 1;
                let region = match user.dinas_id {
                    Some(id) => source.agency(id)?.map(|d| d.region_type),
                    None => None,
                };
                match region {
                    Some(RegionType::Provinsi) => stats.dinas_by_type.provinsi += 1,
                    Some(r) if r.is_kabupaten_kota() => stats.dinas_by_type.kabupaten_kota += 1,
                    _ => {}
                }
            }
        }
    }
    Ok(stats)
}

/// Build the dashboard snapshot for `year` as of `now`.
pub fn dashboard_stats<S: DashboardSource + ?Sized>(
    source: &S,
    year: Year,
    now: DateTime<Utc>,
) -> Result<DashboardStats, SlhdError> {
    Ok(DashboardStats {
        year,
        users: user_stats(source)?,
        submissions: source.submission_aggregate(year)?,
        timeline: TimelineProjector::new().project(source, year, now)?,
        generated_at: now,
    })
}

// =============================================================================
// RECENT ACTIVITY FEED
// =============================================================================

/// One item in the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecentActivity {
    UserRegistration {
        user_id: UserId,
        user_email: String,
        user_role: Role,
        dinas_name: Option<String>,
        /// `approved` or `pending`.
        status: String,
        timestamp: DateTime<Utc>,
    },
    Submission {
        submission_id: SubmissionId,
        dinas_name: Option<String>,
        year: Year,
        status: SubmissionStatus,
        timestamp: DateTime<Utc>,
    },
}

impl RecentActivity {
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RecentActivity::UserRegistration { timestamp, .. }
            | RecentActivity::Submission { timestamp, .. } => *timestamp,
        }
    }
}

/// Feed plus the size of the merged slice it was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentActivities {
    pub activities: Vec<RecentActivity>,
    pub total: usize,
}

/// Merge the newest registrations and submissions, newest first.
///
/// `total` is the merged slice size before truncation, not a store total.
pub fn recent_activities<S: DashboardSource + ?Sized>(
    source: &S,
    limit: usize,
) -> Result<RecentActivities, SlhdError> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let dinas_name = |id: Option<DinasId>| -> Result<Option<String>, SlhdError> {
        match id {
            Some(id) => Ok(source.agency(id)?.map(|d| d.name)),
            None => Ok(None),
        }
    };

    let mut activities = Vec::new();
    for user in source.recent_users(limit)? {
        activities.push(RecentActivity::UserRegistration {
            user_id: user.id,
            dinas_name: dinas_name(user.dinas_id)?,
            user_email: user.email,
            user_role: user.role,
            status: if user.is_active { "approved" } else { "pending" }.to_string(),
            timestamp: user.created_at,
        });
    }
    for submission in source.recent_submissions(limit)? {
        activities.push(RecentActivity::Submission {
            submission_id: submission.id,
            dinas_name: dinas_name(Some(submission.dinas_id))?,
            year: submission.year,
            status: submission.status,
            timestamp: submission.created_at,
        });
    }

    let total = activities.len();
    // Stable sort keeps users ahead of submissions on equal timestamps.
    activities.sort_by_key(|a| std::cmp::Reverse(a.timestamp()));
    activities.truncate(limit);
    Ok(RecentActivities { activities, total })
}

// =============================================================================
// TESTS
// =============================================================================
