//! # slhd-core
//!
//! The domain engine of the SLHD assessment administration backend.
//!
//! This crate owns the annual assessment model: which of the seven stages
//! a program year is in, how the timeline for that year is projected from
//! stored submissions and evaluations, when deadlines have passed, and the
//! audit trail of administrative actions.
//!
//! ## Architectural Constraints
//!
//! - Synchronous and network-free; the HTTP layer lives in the `slhd` app
//! - Storage is a collaborator reached through small read traits
//! - Time is a parameter: every operation that depends on the clock takes `now`
//! - Integer arithmetic only

// =============================================================================
// MODULES
// =============================================================================

pub mod audit;
pub mod dashboard;
pub mod formats;
pub mod pipeline;
pub mod primitives;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    DeadlineId, Dinas, DinasId, DinasStatus, Evaluation, LogId, RegionType, Role, SlhdError,
    Submission, SubmissionId, SubmissionStatus, User, UserId, Year,
};

// =============================================================================
// RE-EXPORTS: Assessment Pipeline
// =============================================================================

pub use pipeline::{
    Deadline, DeadlineInfo, DeadlineUpdate, DeadlineView, Stage, StageReport, StageState,
    StageStatus, Timeline, TimelineEntry, TimelineProjector,
};

// =============================================================================
// RE-EXPORTS: Audit, Dashboard, Storage
// =============================================================================

pub use audit::{
    ActivityDraft, ActivityLog, Actor, LogContext, LogFilter, Page, RequestMeta, Subject,
};
pub use dashboard::{DashboardStats, RecentActivities, RecentActivity, UserStats};
pub use formats::{Snapshot, SnapshotReport};
pub use session::Session;
pub use storage::RedbStore;
pub use store::{MemoryStore, RecordSink};
