//! # Program Store
//!
//! The write side of the record tables and the in-memory backend.
//!
//! Reads are split across small collaborator traits ([`StageLedger`],
//! [`DeadlineStore`], [`SubmissionStore`], ...) so that each computation
//! asks only for what it uses. [`RecordSink`] is the matching write side.

use crate::audit::{ActivityDraft, ActivityLog, ActivityLogStore};
use crate::dashboard::UserStore;
use crate::formats::{Snapshot, SnapshotReport};
use crate::pipeline::{
    AgencyStore, Deadline, DeadlineStore, DeadlineUpdate, EvaluationStore, StageLedger,
    StageStatus, SubmissionStore, canonical_id, same_stage, select_active,
};
use crate::{
    DeadlineId, Dinas, DinasId, Evaluation, LogId, SlhdError, Submission, SubmissionId, User,
    UserId, Year,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Write access to the record tables.
pub trait RecordSink {
    /// Replace the stage record for `status.year`.
    fn put_stage_status(&mut self, status: StageStatus) -> Result<(), SlhdError>;

    /// Create or update the deadline keyed by `(year, stage)`.
    ///
    /// The stored row becomes active with `updated_at = now`.
    fn upsert_deadline(
        &mut self,
        update: &DeadlineUpdate,
        now: DateTime<Utc>,
    ) -> Result<Deadline, SlhdError>;

    /// Store a deadline row as given, id included.
    fn put_deadline(&mut self, deadline: Deadline) -> Result<(), SlhdError>;

    fn put_dinas(&mut self, dinas: Dinas) -> Result<(), SlhdError>;

    fn put_user(&mut self, user: User) -> Result<(), SlhdError>;

    fn put_submission(&mut self, submission: Submission) -> Result<(), SlhdError>;

    fn put_evaluation(&mut self, evaluation: Evaluation) -> Result<(), SlhdError>;

    /// Load every record of a snapshot.
    ///
    /// The snapshot is validated before the first write. Backends with
    /// transactions override this to make the load atomic.
    fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<SnapshotReport, SlhdError> {
        snapshot.validate()?;
        for status in &snapshot.stage_statuses {
            self.put_stage_status(status.clone())?;
        }
        for deadline in &snapshot.deadlines {
            self.put_deadline(deadline.clone())?;
        }
        for dinas in &snapshot.dinas {
            self.put_dinas(dinas.clone())?;
        }
        for user in &snapshot.users {
            self.put_user(user.clone())?;
        }
        for submission in &snapshot.submissions {
            self.put_submission(submission.clone())?;
        }
        for evaluation in &snapshot.evaluations {
            self.put_evaluation(evaluation.clone())?;
        }
        Ok(snapshot.report())
    }
}

/// The row an upsert writes, given the current row for `(year, stage)`.
pub(crate) fn upserted(
    existing: Option<&Deadline>,
    fresh_id: DeadlineId,
    update: &DeadlineUpdate,
    now: DateTime<Utc>,
) -> Deadline {
    Deadline {
        id: existing.map_or(fresh_id, |d| d.id),
        year: update.year,
        stage: canonical_id(&update.stage),
        deadline_at: update.deadline_at,
        note: update.note.clone(),
        is_active: true,
        updated_at: now,
    }
}

/// The newest row for `(year, stage)`, active or not.
pub(crate) fn upsert_target<'a>(
    rows: impl IntoIterator<Item = &'a Deadline>,
    year: Year,
    stage: &str,
) -> Option<&'a Deadline> {
    rows.into_iter()
        .filter(|d| d.year == year && same_stage(&d.stage, stage))
        .max_by_key(|d| (d.updated_at, d.id))
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// Volatile store backed by ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stages: BTreeMap<Year, StageStatus>,
    deadlines: BTreeMap<DeadlineId, Deadline>,
    dinas: BTreeMap<DinasId, Dinas>,
    users: BTreeMap<UserId, User>,
    submissions: BTreeMap<SubmissionId, Submission>,
    evaluations: BTreeMap<(Year, DinasId), Evaluation>,
    logs: Vec<ActivityLog>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_deadline_id(&self) -> Result<DeadlineId, SlhdError> {
        match self.deadlines.keys().next_back() {
            None => Ok(DeadlineId(1)),
            Some(last) => last.successor(),
        }
    }
}

impl StageLedger for MemoryStore {
    fn stage_status(&self, year: Year) -> Result<Option<StageStatus>, SlhdError> {
        Ok(self.stages.get(&year).cloned())
    }
}

impl DeadlineStore for MemoryStore {
    fn active_deadline(&self, year: Year, stage: &str) -> Result<Option<Deadline>, SlhdError> {
        Ok(select_active(self.deadlines.values(), year, stage).cloned())
    }
}

impl SubmissionStore for MemoryStore {
    fn submissions_for_year(&self, year: Year) -> Result<Vec<Submission>, SlhdError> {
        Ok(self
            .submissions
            .values()
            .filter(|s| s.year == year)
            .cloned()
            .collect())
    }

    fn recent_submissions(&self, limit: usize) -> Result<Vec<Submission>, SlhdError> {
        let mut all: Vec<Submission> = self.submissions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all.truncate(limit);
        Ok(all)
    }
}

impl EvaluationStore for MemoryStore {
    fn evaluations_for_year(&self, year: Year) -> Result<Vec<Evaluation>, SlhdError> {
        Ok(self
            .evaluations
            .range((year, DinasId(0))..=(year, DinasId(u64::MAX)))
            .map(|(_, e)| e.clone())
            .collect())
    }
}

impl AgencyStore for MemoryStore {
    fn agency_count(&self) -> Result<u64, SlhdError> {
        Ok(self.dinas.len() as u64)
    }

    fn agency(&self, id: DinasId) -> Result<Option<Dinas>, SlhdError> {
        Ok(self.dinas.get(&id).cloned())
    }
}

impl UserStore for MemoryStore {
    fn users(&self) -> Result<Vec<User>, SlhdError> {
        Ok(self.users.values().cloned().collect())
    }
}

impl ActivityLogStore for MemoryStore {
    fn append_log(
        &mut self,
        draft: ActivityDraft,
        now: DateTime<Utc>,
    ) -> Result<ActivityLog, SlhdError> {
        let id = LogId(self.logs.last().map_or(1, |l| l.id.0 + 1));
        let entry = draft.into_log(id, now);
        self.logs.push(entry.clone());
        Ok(entry)
    }

    fn activity_logs(&self) -> Result<Vec<ActivityLog>, SlhdError> {
        Ok(self.logs.clone())
    }
}

impl RecordSink for MemoryStore {
    fn put_stage_status(&mut self, status: StageStatus) -> Result<(), SlhdError> {
        self.stages.insert(status.year, status);
        Ok(())
    }

    fn upsert_deadline(
        &mut self,
        update: &DeadlineUpdate,
        now: DateTime<Utc>,
    ) -> Result<Deadline, SlhdError> {
        update.validate()?;
        let existing = upsert_target(self.deadlines.values(), update.year, &update.stage);
        let fresh = match existing {
            Some(row) => row.id,
            None => self.next_deadline_id()?,
        };
        let row = upserted(existing, fresh, update, now);
        self.deadlines.insert(row.id, row.clone());
        Ok(row)
    }

    fn put_deadline(&mut self, deadline: Deadline) -> Result<(), SlhdError> {
        self.deadlines.insert(deadline.id, deadline);
        Ok(())
    }

    fn put_dinas(&mut self, dinas: Dinas) -> Result<(), SlhdError> {
        self.dinas.insert(dinas.id, dinas);
        Ok(())
    }

    fn put_user(&mut self, user: User) -> Result<(), SlhdError> {
        self.users.insert(user.id, user);
        Ok(())
    }

    fn put_submission(&mut self, submission: Submission) -> Result<(), SlhdError> {
        self.submissions.insert(submission.id, submission);
        Ok(())
    }

    fn put_evaluation(&mut self, evaluation: Evaluation) -> Result<(), SlhdError> {
        self.evaluations
            .insert((evaluation.year, evaluation.dinas_id), evaluation);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
