//! # Snapshot Format
//!
//! Bulk-load format for program data. A snapshot is a plain serde document
//! (the CLI reads it as JSON) holding any subset of the record tables.
//!
//! ```json
//! {
//!   "stage_statuses": [{ "year": 2026, "active_stage": "validation_1" }],
//!   "dinas": [{ "id": 1, "name": "DLH Kota Bogor", "code": "3271",
//!               "region_type": "kota", "region_name": "Kota Bogor" }],
//!   "evaluations": [{ "year": 2026, "dinas_id": 1, "passed_screening": true }]
//! }
//! ```

use crate::pipeline::{Deadline, StageStatus};
use crate::primitives::{MAX_SNAPSHOT_RECORDS, validate_year};
use crate::{Dinas, Evaluation, SlhdError, Submission, User};
use serde::{Deserialize, Serialize};

/// A batch of records to load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub stage_statuses: Vec<StageStatus>,
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
    #[serde(default)]
    pub dinas: Vec<Dinas>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}

/// Counts of what a snapshot load wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub stage_statuses: usize,
    pub deadlines: usize,
    pub dinas: usize,
    pub users: usize,
    pub submissions: usize,
    pub evaluations: usize,
}

impl SnapshotReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.stage_statuses
            + self.deadlines
            + self.dinas
            + self.users
            + self.submissions
            + self.evaluations
    }
}

impl Snapshot {
    /// What a successful load of this snapshot writes.
    #[must_use]
    pub fn report(&self) -> SnapshotReport {
        SnapshotReport {
            stage_statuses: self.stage_statuses.len(),
            deadlines: self.deadlines.len(),
            dinas: self.dinas.len(),
            users: self.users.len(),
            submissions: self.submissions.len(),
            evaluations: self.evaluations.len(),
        }
    }

    /// Reject oversized snapshots, out-of-range years and deadline ids
    /// that leave no room for new rows, before any write.
    pub fn validate(&self) -> Result<(), SlhdError> {
        let total = self.report().total();
        if total > MAX_SNAPSHOT_RECORDS {
            return Err(SlhdError::InvalidInput(format!(
                "snapshot holds {} records, maximum is {}",
                total, MAX_SNAPSHOT_RECORDS
            )));
        }
        let years = self
            .stage_statuses
            .iter()
            .map(|s| s.year)
            .chain(self.deadlines.iter().map(|d| d.year))
            .chain(self.submissions.iter().map(|s| s.year))
            .chain(self.evaluations.iter().map(|e| e.year));
        for year in years {
            validate_year(year)?;
        }
        for deadline in &self.deadlines {
            deadline.id.successor()?;
        }
        Ok(())
    }
}
