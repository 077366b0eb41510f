//! # Timeline Projector
//!
//! Builds the seven-entry assessment timeline for a year out of the stage
//! ledger, the submission deadline and the yearly aggregates.
//!
//! The projection is a pure read: it holds no locks and writes nothing.
//! Every storage read is a fallible collaborator call; a failed read fails
//! the whole projection (no partial timeline) and is not retried here.
//!
//! ## Statistics per stage
//!
//! | Stage | Participants | Passed |
//! |-------|--------------|--------|
//! | submission | submissions | finalized |
//! | scoring_environmental_report | evaluated | passed screening |
//! | scoring_award | passed screening | award shortlist |
//! | validation_1 | award shortlist | passed validation 1 |
//! | validation_2 | passed validation 1 | passed validation 2 |
//! | interview | passed validation 2 | - |
//! | completed | - | - |

use super::aggregate::{
    AgencyStore, DataInconsistency, EvaluationAggregate, EvaluationStore, SubmissionAggregate,
    SubmissionStore, narrow,
};
use super::deadline::{Deadline, DeadlineInfo, DeadlineStore};
use super::stage::{Stage, StageLedger, StageState, StageStatus, progress_percentage};
use crate::primitives::{DEFAULT_STAGE_NOTE, SUBMISSION_STAGE_TAG};
use crate::{SlhdError, Year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// COLLABORATOR BUNDLE
// =============================================================================

/// Everything the projector reads from.
pub trait TimelineSource:
    StageLedger + DeadlineStore + SubmissionStore + EvaluationStore + AgencyStore
{
}

impl<T> TimelineSource for T where
    T: StageLedger + DeadlineStore + SubmissionStore + EvaluationStore + AgencyStore + ?Sized
{
}

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// Stage-specific counts attached to a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageStatistics {
    Submission {
        total_submissions: u64,
        finalized: u64,
    },
    Screening {
        total_evaluated: u64,
        passed: u64,
        not_passed: u64,
    },
    Award {
        total_participants: u64,
        advanced_to_award: u64,
    },
    Validation {
        total_participants: u64,
        passed: u64,
        not_passed: u64,
    },
    Interview {
        total_participants: u64,
    },
}

/// One stage of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub stage_id: String,
    pub label: String,
    pub order: u8,
    pub status: StageState,
    /// Only the submission entry carries a deadline.
    #[serde(default)]
    pub deadline: Option<DeadlineInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StageStatistics>,
}

/// Headline numbers for the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub total_registered_agencies: u64,
    pub total_submissions: u64,
    pub passed_screening: u64,
    pub passed_shortlist: u64,
    pub passed_validation_1: u64,
    pub passed_validation_2: u64,
}

/// The composed timeline for a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub year: Year,
    pub active_stage: String,
    pub active_stage_label: String,
    pub announcement_open: bool,
    pub note: String,
    pub stage_started_at: Option<DateTime<Utc>>,
    pub progress_percentage: u8,
    pub timeline: Vec<TimelineEntry>,
    pub summary: TimelineSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_warnings: Vec<DataInconsistency>,
}

impl Timeline {
    /// Entry for a given stage.
    #[must_use]
    pub fn entry(&self, stage: Stage) -> Option<&TimelineEntry> {
        self.timeline.iter().find(|e| e.stage_id == stage.id())
    }
}

/// Direct stage polling view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub year: Year,
    pub stage_id: String,
    pub label: String,
    pub rank: u8,
    pub announcement_open: bool,
    pub note: String,
    pub stage_started_at: Option<DateTime<Utc>>,
    /// Active deadline of the active stage, if one is set.
    pub deadline: Option<DeadlineInfo>,
    pub is_passed: bool,
}

// =============================================================================
// INPUTS
// =============================================================================

/// Everything the composition step needs, already fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineInputs {
    pub stage: StageStatus,
    pub submission_deadline: Option<Deadline>,
    pub submissions: SubmissionAggregate,
    pub evaluations: EvaluationAggregate,
    pub agency_count: u64,
}

impl TimelineInputs {
    /// Fetch all inputs for a year from the collaborators.
    pub fn fetch<S: TimelineSource + ?Sized>(source: &S, year: Year) -> Result<Self, SlhdError> {
        Ok(Self {
            stage: source.current_stage(year)?,
            submission_deadline: source.active_deadline(year, SUBMISSION_STAGE_TAG)?,
            submissions: source.submission_aggregate(year)?,
            evaluations: source.evaluation_aggregate(year)?,
            agency_count: source.agency_count()?,
        })
    }
}

// =============================================================================
// PROJECTOR
// =============================================================================

/// Timeline projector.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimelineProjector;

impl TimelineProjector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Project the timeline for `year` as of `now`.
    pub fn project<S: TimelineSource + ?Sized>(
        &self,
        source: &S,
        year: Year,
        now: DateTime<Utc>,
    ) -> Result<Timeline, SlhdError> {
        let inputs = TimelineInputs::fetch(source, year)?;
        let timeline = self.compose(&inputs, now);
        for warning in &timeline.data_warnings {
            tracing::warn!(
                event = "data_inconsistency",
                year,
                stage = %warning.stage,
                denominator = warning.denominator,
                numerator = warning.numerator,
                "Pass count exceeds participants; clamping not-passed to 0"
            );
        }
        Ok(timeline)
    }

    /// Compose a timeline from fetched inputs.
    ///
    /// Legacy stage tags are reported under their current id; unmapped
    /// identifiers pass through unchanged.
    #[must_use]
    pub fn compose(&self, inputs: &TimelineInputs, now: DateTime<Utc>) -> Timeline {
        let current_rank = inputs.stage.rank();
        let subs = inputs.submissions;
        let evals = inputs.evaluations;

        let [screening, award, validation_1, validation_2] = evals
            .steps()
            .map(|(stage, participants, passed)| narrow(stage, participants, passed));
        let warnings: Vec<DataInconsistency> = [screening, award, validation_1, validation_2]
            .iter()
            .filter_map(|n| n.inconsistency)
            .collect();

        let timeline = Stage::ALL
            .iter()
            .map(|&stage| {
                let statistics = match stage {
                    Stage::Submission => Some(StageStatistics::Submission {
                        total_submissions: subs.total,
                        finalized: subs.finalized,
                    }),
                    Stage::ScoringEnvironmentalReport => Some(StageStatistics::Screening {
                        total_evaluated: screening.participants,
                        passed: screening.passed,
                        not_passed: screening.not_passed,
                    }),
                    Stage::ScoringAward => Some(StageStatistics::Award {
                        total_participants: award.participants,
                        advanced_to_award: award.passed,
                    }),
                    Stage::Validation1 | Stage::Validation2 => {
                        let n = if stage == Stage::Validation1 {
                            validation_1
                        } else {
                            validation_2
                        };
                        Some(StageStatistics::Validation {
                            total_participants: n.participants,
                            passed: n.passed,
                            not_passed: n.not_passed,
                        })
                    }
                    Stage::Interview => Some(StageStatistics::Interview {
                        total_participants: evals.passed_validation_2,
                    }),
                    Stage::Completed => None,
                };

                let deadline = match stage {
                    Stage::Submission => inputs
                        .submission_deadline
                        .as_ref()
                        .map(|d| DeadlineInfo::from_deadline(d, now)),
                    _ => None,
                };

                TimelineEntry {
                    stage_id: stage.id().to_string(),
                    label: stage.label().to_string(),
                    order: stage.rank(),
                    status: stage.state_at(current_rank),
                    deadline,
                    statistics,
                }
            })
            .collect();

        Timeline {
            year: inputs.stage.year,
            active_stage: inputs.stage.stage_id(),
            active_stage_label: inputs.stage.label(),
            announcement_open: inputs.stage.announcement_open,
            note: note_or_default(&inputs.stage),
            stage_started_at: inputs.stage.stage_started_at,
            progress_percentage: progress_percentage(current_rank),
            timeline,
            summary: TimelineSummary {
                total_registered_agencies: inputs.agency_count,
                total_submissions: subs.total,
                passed_screening: evals.passed_screening,
                passed_shortlist: evals.passed_shortlist,
                passed_validation_1: evals.passed_validation_1,
                passed_validation_2: evals.passed_validation_2,
            },
            data_warnings: warnings,
        }
    }

    /// Stage polling view for `year` as of `now`.
    pub fn stage_report<S: StageLedger + DeadlineStore + ?Sized>(
        &self,
        source: &S,
        year: Year,
        now: DateTime<Utc>,
    ) -> Result<StageReport, SlhdError> {
        let stage = source.current_stage(year)?;
        let stage_id = stage.stage_id();
        let deadline = source
            .active_deadline(year, &stage_id)?
            .map(|d| DeadlineInfo::from_deadline(&d, now));
        Ok(StageReport {
            year,
            label: stage.label(),
            rank: stage.rank(),
            announcement_open: stage.announcement_open,
            note: note_or_default(&stage),
            stage_started_at: stage.stage_started_at,
            is_passed: deadline.as_ref().is_some_and(|d| d.is_passed),
            deadline,
            stage_id,
        })
    }
}

fn note_or_default(stage: &StageStatus) -> String {
    stage
        .note
        .clone()
        .unwrap_or_else(|| DEFAULT_STAGE_NOTE.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
