//! # redb-backed Program Storage
//!
//! A disk-backed store using the redb embedded database.
//!
//! Records are postcard-encoded into one table per record kind. Id
//! counters live in a small metadata table so that ids stay unique across
//! restarts.
//!
//! ## Integration with Session
//!
//! `RedbStore` is the persistent backend of a session. Every write commits
//! its own transaction; a snapshot load commits once for the whole batch.

use crate::audit::{ActivityDraft, ActivityLog, ActivityLogStore};
use crate::dashboard::UserStore;
use crate::formats::{Snapshot, SnapshotReport};
use crate::pipeline::{
    AgencyStore, Deadline, DeadlineStore, DeadlineUpdate, EvaluationStore, StageLedger,
    StageStatus, SubmissionStore, select_active,
};
use crate::store::{RecordSink, upsert_target, upserted};
use crate::{DeadlineId, Dinas, DinasId, Evaluation, LogId, SlhdError, Submission, User, Year};
use chrono::{DateTime, Utc};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Stage records: year -> StageStatus
const STAGE_STATUS: TableDefinition<i32, &[u8]> = TableDefinition::new("stage_status");

/// Deadlines: DeadlineId -> Deadline
const DEADLINES: TableDefinition<u64, &[u8]> = TableDefinition::new("deadlines");

/// Agency registry: DinasId -> Dinas
const DINAS: TableDefinition<u64, &[u8]> = TableDefinition::new("dinas");

/// Accounts: UserId -> User
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Submissions: SubmissionId -> Submission
const SUBMISSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("submissions");

/// Evaluation recaps: (year, DinasId) -> Evaluation
const EVALUATIONS: TableDefinition<(i32, u64), &[u8]> = TableDefinition::new("evaluations");

/// Audit trail: LogId -> ActivityLog
const ACTIVITY_LOGS: TableDefinition<u64, &[u8]> = TableDefinition::new("activity_logs");

/// Counters: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_DEADLINE_ID: &str = "next_deadline_id";
const NEXT_LOG_ID: &str = "next_log_id";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SlhdError> {
    postcard::to_allocvec(value).map_err(|e| SlhdError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SlhdError> {
    postcard::from_bytes(bytes).map_err(|e| SlhdError::Serialization(e.to_string()))
}

/// Read a counter, defaulting to 1.
fn next_id(txn: &WriteTransaction, key: &str) -> Result<u64, SlhdError> {
    let meta = txn.open_table(METADATA).map_err(SlhdError::storage)?;
    let value = meta
        .get(key)
        .map_err(SlhdError::storage)?
        .map(|v| v.value())
        .unwrap_or(1);
    Ok(value)
}

fn bump_id(txn: &WriteTransaction, key: &str, next: u64) -> Result<(), SlhdError> {
    let mut meta = txn.open_table(METADATA).map_err(SlhdError::storage)?;
    meta.insert(key, next).map_err(SlhdError::storage)?;
    Ok(())
}

fn insert_record<T: Serialize>(
    txn: &WriteTransaction,
    table: TableDefinition<'static, u64, &'static [u8]>,
    key: u64,
    value: &T,
) -> Result<(), SlhdError> {
    let bytes = encode(value)?;
    let mut t = txn.open_table(table).map_err(SlhdError::storage)?;
    t.insert(key, bytes.as_slice()).map_err(SlhdError::storage)?;
    Ok(())
}

fn insert_stage(txn: &WriteTransaction, status: &StageStatus) -> Result<(), SlhdError> {
    let bytes = encode(status)?;
    let mut t = txn.open_table(STAGE_STATUS).map_err(SlhdError::storage)?;
    t.insert(status.year, bytes.as_slice())
        .map_err(SlhdError::storage)?;
    Ok(())
}

fn insert_evaluation(txn: &WriteTransaction, evaluation: &Evaluation) -> Result<(), SlhdError> {
    let bytes = encode(evaluation)?;
    let mut t = txn.open_table(EVALUATIONS).map_err(SlhdError::storage)?;
    t.insert((evaluation.year, evaluation.dinas_id.0), bytes.as_slice())
        .map_err(SlhdError::storage)?;
    Ok(())
}

/// Insert a deadline row and keep the id counter ahead of it.
fn insert_deadline(txn: &WriteTransaction, deadline: &Deadline) -> Result<(), SlhdError> {
    insert_record(txn, DEADLINES, deadline.id.0, deadline)?;
    let next = next_id(txn, NEXT_DEADLINE_ID)?;
    if deadline.id.0 >= next {
        bump_id(txn, NEXT_DEADLINE_ID, deadline.id.successor()?.0)?;
    }
    Ok(())
}

/// A disk-backed program store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SlhdError> {
        let db = Database::create(path.as_ref()).map_err(|e| SlhdError::Io(e.to_string()))?;

        // Create every table up front so read transactions never miss one.
        {
            let write_txn = db.begin_write().map_err(SlhdError::storage)?;
            let _ = write_txn
                .open_table(STAGE_STATUS)
                .map_err(SlhdError::storage)?;
            let _ = write_txn.open_table(DEADLINES).map_err(SlhdError::storage)?;
            let _ = write_txn.open_table(DINAS).map_err(SlhdError::storage)?;
            let _ = write_txn.open_table(USERS).map_err(SlhdError::storage)?;
            let _ = write_txn
                .open_table(SUBMISSIONS)
                .map_err(SlhdError::storage)?;
            let _ = write_txn
                .open_table(EVALUATIONS)
                .map_err(SlhdError::storage)?;
            let _ = write_txn
                .open_table(ACTIVITY_LOGS)
                .map_err(SlhdError::storage)?;
            let _ = write_txn.open_table(METADATA).map_err(SlhdError::storage)?;
            write_txn.commit().map_err(SlhdError::storage)?;
        }

        Ok(Self { db })
    }

    /// Run `f` in a write transaction and commit on success.
    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, SlhdError>,
    ) -> Result<T, SlhdError> {
        let txn = self.db.begin_write().map_err(SlhdError::storage)?;
        let out = f(&txn)?;
        txn.commit().map_err(SlhdError::storage)?;
        Ok(out)
    }

    /// Decode every record of a u64-keyed table in key order.
    fn scan<T: DeserializeOwned>(
        &self,
        table: TableDefinition<'static, u64, &'static [u8]>,
    ) -> Result<Vec<T>, SlhdError> {
        let read_txn = self.db.begin_read().map_err(SlhdError::storage)?;
        let t = read_txn.open_table(table).map_err(SlhdError::storage)?;
        let mut out = Vec::new();
        for entry in t.iter().map_err(SlhdError::storage)? {
            let (_, value) = entry.map_err(SlhdError::storage)?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        table: TableDefinition<'static, u64, &'static [u8]>,
        key: u64,
    ) -> Result<Option<T>, SlhdError> {
        let read_txn = self.db.begin_read().map_err(SlhdError::storage)?;
        let t = read_txn.open_table(table).map_err(SlhdError::storage)?;
        match t.get(key).map_err(SlhdError::storage)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }
}

// =============================================================================
// READ TRAITS
// =============================================================================

impl StageLedger for RedbStore {
    fn stage_status(&self, year: Year) -> Result<Option<StageStatus>, SlhdError> {
        let read_txn = self.db.begin_read().map_err(SlhdError::storage)?;
        let t = read_txn
            .open_table(STAGE_STATUS)
            .map_err(SlhdError::storage)?;
        match t.get(year).map_err(SlhdError::storage)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }
}

impl DeadlineStore for RedbStore {
    fn active_deadline(&self, year: Year, stage: &str) -> Result<Option<Deadline>, SlhdError> {
        let rows: Vec<Deadline> = self.scan(DEADLINES)?;
        Ok(select_active(&rows, year, stage).cloned())
    }
}

impl SubmissionStore for RedbStore {
    fn submissions_for_year(&self, year: Year) -> Result<Vec<Submission>, SlhdError> {
        let mut rows: Vec<Submission> = self.scan(SUBMISSIONS)?;
        rows.retain(|s| s.year == year);
        Ok(rows)
    }

    fn recent_submissions(&self, limit: usize) -> Result<Vec<Submission>, SlhdError> {
        let mut rows: Vec<Submission> = self.scan(SUBMISSIONS)?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }
}

impl EvaluationStore for RedbStore {
    fn evaluations_for_year(&self, year: Year) -> Result<Vec<Evaluation>, SlhdError> {
        let read_txn = self.db.begin_read().map_err(SlhdError::storage)?;
        let t = read_txn
            .open_table(EVALUATIONS)
            .map_err(SlhdError::storage)?;
        let mut out = Vec::new();
        for entry in t
            .range((year, 0u64)..=(year, u64::MAX))
            .map_err(SlhdError::storage)?
        {
            let (_, value) = entry.map_err(SlhdError::storage)?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }
}

impl AgencyStore for RedbStore {
    fn agency_count(&self) -> Result<u64, SlhdError> {
        let read_txn = self.db.begin_read().map_err(SlhdError::storage)?;
        let t = read_txn.open_table(DINAS).map_err(SlhdError::storage)?;
        t.len().map_err(SlhdError::storage)
    }

    fn agency(&self, id: DinasId) -> Result<Option<Dinas>, SlhdError> {
        self.fetch(DINAS, id.0)
    }
}

impl UserStore for RedbStore {
    fn users(&self) -> Result<Vec<User>, SlhdError> {
        self.scan(USERS)
    }
}

impl ActivityLogStore for RedbStore {
    fn append_log(
        &mut self,
        draft: ActivityDraft,
        now: DateTime<Utc>,
    ) -> Result<ActivityLog, SlhdError> {
        self.write(|txn| {
            let id = next_id(txn, NEXT_LOG_ID)?;
            let entry = draft.into_log(LogId(id), now);
            insert_record(txn, ACTIVITY_LOGS, id, &entry)?;
            bump_id(txn, NEXT_LOG_ID, id.saturating_add(1))?;
            Ok(entry)
        })
    }

    fn activity_logs(&self) -> Result<Vec<ActivityLog>, SlhdError> {
        self.scan(ACTIVITY_LOGS)
    }
}

// =============================================================================
// WRITES
// =============================================================================

impl RecordSink for RedbStore {
    fn put_stage_status(&mut self, status: StageStatus) -> Result<(), SlhdError> {
        self.write(|txn| insert_stage(txn, &status))
    }

    fn upsert_deadline(
        &mut self,
        update: &DeadlineUpdate,
        now: DateTime<Utc>,
    ) -> Result<Deadline, SlhdError> {
        update.validate()?;
        self.write(|txn| {
            let rows: Vec<Deadline> = {
                let t = txn.open_table(DEADLINES).map_err(SlhdError::storage)?;
                let mut rows = Vec::new();
                for entry in t.iter().map_err(SlhdError::storage)? {
                    let (_, value) = entry.map_err(SlhdError::storage)?;
                    rows.push(decode(value.value())?);
                }
                rows
            };
            let fresh = DeadlineId(next_id(txn, NEXT_DEADLINE_ID)?);
            let row = upserted(
                upsert_target(&rows, update.year, &update.stage),
                fresh,
                update,
                now,
            );
            insert_deadline(txn, &row)?;
            Ok(row)
        })
    }

    fn put_deadline(&mut self, deadline: Deadline) -> Result<(), SlhdError> {
        self.write(|txn| insert_deadline(txn, &deadline))
    }

    fn put_dinas(&mut self, dinas: Dinas) -> Result<(), SlhdError> {
        self.write(|txn| insert_record(txn, DINAS, dinas.id.0, &dinas))
    }

    fn put_user(&mut self, user: User) -> Result<(), SlhdError> {
        self.write(|txn| insert_record(txn, USERS, user.id.0, &user))
    }

    fn put_submission(&mut self, submission: Submission) -> Result<(), SlhdError> {
        self.write(|txn| insert_record(txn, SUBMISSIONS, submission.id.0, &submission))
    }

    fn put_evaluation(&mut self, evaluation: Evaluation) -> Result<(), SlhdError> {
        self.write(|txn| insert_evaluation(txn, &evaluation))
    }

    /// Load a snapshot in a single transaction.
    ///
    /// Either every record lands or none does.
    fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<SnapshotReport, SlhdError> {
        snapshot.validate()?;
        self.write(|txn| {
            for status in &snapshot.stage_statuses {
                insert_stage(txn, status)?;
            }
            for deadline in &snapshot.deadlines {
                insert_deadline(txn, deadline)?;
            }
            for dinas in &snapshot.dinas {
                insert_record(txn, DINAS, dinas.id.0, dinas)?;
            }
            for user in &snapshot.users {
                insert_record(txn, USERS, user.id.0, user)?;
            }
            for submission in &snapshot.submissions {
                insert_record(txn, SUBMISSIONS, submission.id.0, submission)?;
            }
            for evaluation in &snapshot.evaluations {
                insert_evaluation(txn, evaluation)?;
            }
            Ok(snapshot.report())
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
