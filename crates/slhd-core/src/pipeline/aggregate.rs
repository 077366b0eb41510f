//! # Pipeline Aggregates
//!
//! Yearly counts the timeline is projected from, and the collaborator
//! traits that produce them.
//!
//! The assessment narrows: every stage's participants are the previous
//! stage's passes, so `screening ⊇ shortlist ⊇ validation 1 ⊇ validation 2`.
//! Stored data that violates this is reported as a [`DataInconsistency`]
//! and the derived "not passed" figure clamps to zero.

use super::stage::Stage;
use crate::{Dinas, DinasId, Evaluation, SlhdError, Submission, SubmissionStatus, Year};
use serde::{Deserialize, Serialize};

// =============================================================================
// AGGREGATES
// =============================================================================

/// Submission counts for one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmissionAggregate {
    pub total: u64,
    pub draft: u64,
    pub finalized: u64,
    pub approved: u64,
}

impl SubmissionAggregate {
    /// Tally a set of submissions.
    pub fn tally<'a>(submissions: impl IntoIterator<Item = &'a Submission>) -> Self {
        let mut agg = Self::default();
        for submission in submissions {
            agg.total = agg.total.saturating_add(1);
            let slot = match submission.status {
                SubmissionStatus::Draft => &mut agg.draft,
                SubmissionStatus::Finalized => &mut agg.finalized,
                SubmissionStatus::Approved => &mut agg.approved,
            };
            *slot = slot.saturating_add(1);
        }
        agg
    }
}

/// Evaluation pass counts for one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationAggregate {
    /// Number of evaluated dinas.
    pub total: u64,
    pub passed_screening: u64,
    pub passed_shortlist: u64,
    pub passed_validation_1: u64,
    pub passed_validation_2: u64,
}

impl EvaluationAggregate {
    pub fn tally<'a>(evaluations: impl IntoIterator<Item = &'a Evaluation>) -> Self {
        let mut agg = Self::default();
        let bump = |n: &mut u64, flag: bool| {
            if flag {
                *n = n.saturating_add(1);
            }
        };
        for e in evaluations {
            agg.total = agg.total.saturating_add(1);
            bump(&mut agg.passed_screening, e.passed_screening);
            bump(&mut agg.passed_shortlist, e.award_shortlist);
            bump(&mut agg.passed_validation_1, e.passed_validation_1);
            bump(&mut agg.passed_validation_2, e.passed_validation_2);
        }
        agg
    }

    /// The narrowing steps as `(stage, participants, passed)`.
    #[must_use]
    pub fn steps(&self) -> [(Stage, u64, u64); 4] {
        [
            (Stage::ScoringEnvironmentalReport, self.total, self.passed_screening),
            (Stage::ScoringAward, self.passed_screening, self.passed_shortlist),
            (Stage::Validation1, self.passed_shortlist, self.passed_validation_1),
            (Stage::Validation2, self.passed_validation_1, self.passed_validation_2),
        ]
    }
}

// =============================================================================
// NARROWING
// =============================================================================

/// A later stage reporting more passes than it had participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInconsistency {
    pub stage: Stage,
    pub denominator: u64,
    pub numerator: u64,
}

impl std::fmt::Display for DataInconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stage {} reports {} passed out of {} participants",
            self.stage, self.numerator, self.denominator
        )
    }
}

/// Result of one narrowing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Narrowed {
    pub participants: u64,
    pub passed: u64,
    pub not_passed: u64,
    pub inconsistency: Option<DataInconsistency>,
}

/// `not_passed = max(0, denominator - numerator)`.
#[must_use]
pub fn narrow(stage: Stage, denominator: u64, numerator: u64) -> Narrowed {
    let inconsistency = (numerator > denominator).then_some(DataInconsistency {
        stage,
        denominator,
        numerator,
    });
    Narrowed {
        participants: denominator,
        passed: numerator,
        not_passed: denominator.saturating_sub(numerator),
        inconsistency,
    }
}

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// Read access to submissions.
pub trait SubmissionStore {
    fn submissions_for_year(&self, year: Year) -> Result<Vec<Submission>, SlhdError>;

    /// Newest submissions across all years, newest first.
    fn recent_submissions(&self, limit: usize) -> Result<Vec<Submission>, SlhdError>;

    fn submission_aggregate(&self, year: Year) -> Result<SubmissionAggregate, SlhdError> {
        Ok(SubmissionAggregate::tally(&self.submissions_for_year(year)?))
    }
}

/// Read access to evaluation recaps.
pub trait EvaluationStore {
    fn evaluations_for_year(&self, year: Year) -> Result<Vec<Evaluation>, SlhdError>;

    fn evaluation_aggregate(&self, year: Year) -> Result<EvaluationAggregate, SlhdError> {
        Ok(EvaluationAggregate::tally(&self.evaluations_for_year(year)?))
    }
}

/// Read access to the agency registry.
pub trait AgencyStore {
    fn agency_count(&self) -> Result<u64, SlhdError>;

    fn agency(&self, id: DinasId) -> Result<Option<Dinas>, SlhdError>;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SubmissionId;
    use chrono::{TimeZone, Utc};

    fn submission(id: u64, status: SubmissionStatus) -> Submission {
        Submission {
            id: SubmissionId(id),
            dinas_id: DinasId(id),
            year: 2026,
            status,
            iklh_hundredths: None,
            created_at: Utc
                .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
                .single()
                .expect("valid date"),
        }
    }

    #[test]
    fn narrowing_subtracts() {
        let n = narrow(Stage::Validation1, 30, 12);
        assert_eq!(n.participants, 30);
        assert_eq!(n.not_passed, 18);
        assert!(n.inconsistency.is_none());
    }

    #[test]
    fn narrowing_clamps_inconsistent_input() {
        let n = narrow(Stage::ScoringEnvironmentalReport, 100, 120);
        assert_eq!(n.not_passed, 0);
        let issue = n.inconsistency.expect("flagged");
        assert_eq!(issue.denominator, 100);
        assert_eq!(issue.numerator, 120);
    }

    #[test]
    fn submission_tally_counts_statuses() {
        let subs = vec![
            submission(1, SubmissionStatus::Draft),
            submission(2, SubmissionStatus::Finalized),
            submission(3, SubmissionStatus::Finalized),
            submission(4, SubmissionStatus::Approved),
        ];
        let agg = SubmissionAggregate::tally(&subs);
        assert_eq!(agg.total, 4);
        assert_eq!(agg.draft, 1);
        assert_eq!(agg.finalized, 2);
        assert_eq!(agg.approved, 1);
    }

    #[test]
    fn evaluation_steps_chain_denominators() {
        let agg = EvaluationAggregate {
            total: 80,
            passed_screening: 50,
            passed_shortlist: 30,
            passed_validation_1: 20,
            passed_validation_2: 10,
        };
        let steps = agg.steps();
        assert_eq!(steps[1], (Stage::ScoringAward, 50, 30));
        assert_eq!(steps[3], (Stage::Validation2, 20, 10));
    }
}
