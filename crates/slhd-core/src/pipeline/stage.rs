//! # Stage Ledger
//!
//! The annual assessment runs through seven fixed stages:
//!
//! | Rank | Stage | Label |
//! |------|-------|-------|
//! | 1 | `submission` | Submission DLH |
//! | 2 | `scoring_environmental_report` | Penilaian SLHD |
//! | 3 | `scoring_award` | Penilaian Penghargaan |
//! | 4 | `validation_1` | Validasi Tahap 1 |
//! | 5 | `validation_2` | Validasi Tahap 2 |
//! | 6 | `interview` | Wawancara |
//! | 7 | `completed` | Penilaian Selesai |
//!
//! The ledger keeps one [`StageStatus`] per year. It is written by the
//! workflow that advances stages and only read here. A year without a
//! record is a valid state: it reads as the default (`submission`, closed
//! announcement).
//!
//! Stored stage identifiers are kept as raw strings so that an unmapped
//! identifier never fails a read; it resolves to rank 1 and labels itself.

use crate::primitives::{DEFAULT_STAGE_NOTE, STAGE_COUNT};
use crate::{SlhdError, Year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE ENUM
// =============================================================================

/// One of the seven pipeline stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submission,
    ScoringEnvironmentalReport,
    ScoringAward,
    #[serde(rename = "validation_1")]
    Validation1,
    #[serde(rename = "validation_2")]
    Validation2,
    Interview,
    Completed,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; STAGE_COUNT as usize] = [
        Stage::Submission,
        Stage::ScoringEnvironmentalReport,
        Stage::ScoringAward,
        Stage::Validation1,
        Stage::Validation2,
        Stage::Interview,
        Stage::Completed,
    ];

    /// Stage identifier as stored and serialized.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Stage::Submission => "submission",
            Stage::ScoringEnvironmentalReport => "scoring_environmental_report",
            Stage::ScoringAward => "scoring_award",
            Stage::Validation1 => "validation_1",
            Stage::Validation2 => "validation_2",
            Stage::Interview => "interview",
            Stage::Completed => "completed",
        }
    }

    /// Human label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Submission => "Submission DLH",
            Stage::ScoringEnvironmentalReport => "Penilaian SLHD",
            Stage::ScoringAward => "Penilaian Penghargaan",
            Stage::Validation1 => "Validasi Tahap 1",
            Stage::Validation2 => "Validasi Tahap 2",
            Stage::Interview => "Wawancara",
            Stage::Completed => "Penilaian Selesai",
        }
    }

    /// Fixed rank in 1..=7.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Stage::Submission => 1,
            Stage::ScoringEnvironmentalReport => 2,
            Stage::ScoringAward => 3,
            Stage::Validation1 => 4,
            Stage::Validation2 => 5,
            Stage::Interview => 6,
            Stage::Completed => 7,
        }
    }

    /// Resolve a stored identifier. Legacy Indonesian tags are accepted.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Stage> {
        match id {
            "submission" => Some(Stage::Submission),
            "scoring_environmental_report" | "penilaian_slhd" => {
                Some(Stage::ScoringEnvironmentalReport)
            }
            "scoring_award" | "penilaian_penghargaan" => Some(Stage::ScoringAward),
            "validation_1" | "validasi_1" => Some(Stage::Validation1),
            "validation_2" | "validasi_2" => Some(Stage::Validation2),
            "interview" | "wawancara" => Some(Stage::Interview),
            "completed" | "selesai" => Some(Stage::Completed),
            _ => None,
        }
    }

    /// The terminal stage has no active state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed)
    }

    /// Status of this stage given the rank of the active stage.
    #[must_use]
    pub fn state_at(&self, current_rank: u8) -> StageState {
        let rank = self.rank();
        if self.is_terminal() {
            return if current_rank >= rank {
                StageState::Completed
            } else {
                StageState::Pending
            };
        }
        if current_rank > rank {
            StageState::Completed
        } else if current_rank == rank {
            StageState::Active
        } else {
            StageState::Pending
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Rank of a stored stage identifier; unmapped identifiers rank 1.
#[must_use]
pub fn rank_of(id: &str) -> u8 {
    Stage::from_id(id).map(|s| s.rank()).unwrap_or(1)
}

/// Label of a stored stage identifier; unmapped identifiers label themselves.
#[must_use]
pub fn label_of(id: &str) -> String {
    Stage::from_id(id)
        .map(|s| s.label().to_string())
        .unwrap_or_else(|| id.to_string())
}

/// Canonical form of a stored stage identifier. Legacy tags map to the
/// current id; unmapped identifiers are kept verbatim.
#[must_use]
pub fn canonical_id(id: &str) -> String {
    Stage::from_id(id).map_or_else(|| id.to_string(), |s| s.id().to_string())
}

/// True when two stored identifiers name the same stage.
#[must_use]
pub fn same_stage(a: &str, b: &str) -> bool {
    match (Stage::from_id(a), Stage::from_id(b)) {
        (Some(x), Some(y)) => x == y,
        (None, None) => a == b,
        _ => false,
    }
}

/// Overall pipeline progress for a rank: round(rank / 7 * 100).
///
/// Integer form of half-up rounding: (rank * 200 + 7) / 14.
#[must_use]
pub fn progress_percentage(rank: u8) -> u8 {
    let rank = u32::from(rank.min(STAGE_COUNT));
    let steps = u32::from(STAGE_COUNT);
    ((rank * 200 + steps) / (steps * 2)) as u8
}

/// Display status of a stage within a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Completed,
    Active,
    Pending,
}

// =============================================================================
// STAGE STATUS RECORD
// =============================================================================

/// Ledger record for one program year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    pub year: Year,
    /// Stored stage identifier (see [`Stage::from_id`]).
    pub active_stage: String,
    #[serde(default)]
    pub announcement_open: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub stage_started_at: Option<DateTime<Utc>>,
}

impl StageStatus {
    /// The state of a year whose pipeline has not started.
    #[must_use]
    pub fn default_for(year: Year) -> Self {
        Self {
            year,
            active_stage: Stage::Submission.id().to_string(),
            announcement_open: false,
            note: Some(DEFAULT_STAGE_NOTE.to_string()),
            stage_started_at: None,
        }
    }

    /// Rank of the active stage.
    #[must_use]
    pub fn rank(&self) -> u8 {
        rank_of(&self.active_stage)
    }

    /// Label of the active stage.
    #[must_use]
    pub fn label(&self) -> String {
        label_of(&self.active_stage)
    }

    /// Canonical id of the active stage.
    #[must_use]
    pub fn stage_id(&self) -> String {
        canonical_id(&self.active_stage)
    }
}

// =============================================================================
// STAGE LEDGER
// =============================================================================

/// Read access to the per-year stage records.
pub trait StageLedger {
    /// The stored record for a year, if any.
    fn stage_status(&self, year: Year) -> Result<Option<StageStatus>, SlhdError>;

    /// The record for a year, defaulted when absent.
    fn current_stage(&self, year: Year) -> Result<StageStatus, SlhdError> {
        Ok(self
            .stage_status(year)?
            .unwrap_or_else(|| StageStatus::default_for(year)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyLedger;

    impl StageLedger for EmptyLedger {
        fn stage_status(&self, _year: Year) -> Result<Option<StageStatus>, SlhdError> {
            Ok(None)
        }
    }

    #[test]
    fn ranks_follow_pipeline_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(usize::from(stage.rank()), i + 1);
        }
        assert!(Stage::Submission < Stage::Completed);
    }

    #[test]
    fn missing_record_defaults_to_submission() {
        let status = EmptyLedger.current_stage(2031).expect("ledger");
        assert_eq!(status.year, 2031);
        assert_eq!(status.active_stage, "submission");
        assert_eq!(status.rank(), 1);
        assert!(!status.announcement_open);
        assert_eq!(status.note.as_deref(), Some(DEFAULT_STAGE_NOTE));
    }

    #[test]
    fn unknown_identifier_ranks_first_and_labels_itself() {
        assert_eq!(rank_of("appeal_round"), 1);
        assert_eq!(label_of("appeal_round"), "appeal_round");
    }

    #[test]
    fn legacy_identifiers_resolve() {
        assert_eq!(Stage::from_id("validasi_1"), Some(Stage::Validation1));
        assert_eq!(Stage::from_id("wawancara"), Some(Stage::Interview));
        assert_eq!(label_of("penilaian_slhd"), "Penilaian SLHD");
    }

    #[test]
    fn legacy_identifiers_canonicalize() {
        assert_eq!(canonical_id("validasi_1"), "validation_1");
        assert_eq!(canonical_id("appeal_round"), "appeal_round");
        assert!(same_stage("wawancara", "interview"));
        assert!(same_stage("appeal_round", "appeal_round"));
        assert!(!same_stage("appeal_round", "submission"));

        let status = StageStatus {
            year: 2026,
            active_stage: "penilaian_penghargaan".into(),
            announcement_open: false,
            note: None,
            stage_started_at: None,
        };
        assert_eq!(status.stage_id(), "scoring_award");
        assert_eq!(status.rank(), 3);
    }

    #[test]
    fn terminal_stage_is_never_active() {
        assert_eq!(Stage::Completed.state_at(6), StageState::Pending);
        assert_eq!(Stage::Completed.state_at(7), StageState::Completed);
        assert_eq!(Stage::Interview.state_at(7), StageState::Completed);
    }

    #[test]
    fn progress_matches_rounded_fraction() {
        let expected = [14, 29, 43, 57, 71, 86, 100];
        for (rank, want) in (1..=7).zip(expected) {
            assert_eq!(progress_percentage(rank), want, "rank {}", rank);
        }
    }

    #[test]
    fn every_id_resolves_to_its_stage() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_id(stage.id()), Some(stage));
            assert_eq!(stage.to_string(), stage.id());
        }
    }
}
