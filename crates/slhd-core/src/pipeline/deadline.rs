//! # Deadlines
//!
//! Deadline rows are keyed by `(year, stage)`. Only active rows are visible
//! to projections. When several active rows exist for the same key, the
//! one with the latest `updated_at` wins, and equal timestamps fall back to
//! the highest id. Legacy stage tags match their current id.

use super::stage::same_stage;
use crate::primitives::validate_year;
use crate::{DeadlineId, SlhdError, Year};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Indonesian month names, January first.
const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// A stored deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: DeadlineId,
    pub year: Year,
    pub stage: String,
    pub deadline_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Deadline {
    /// True once the clock is strictly past the deadline.
    #[must_use]
    pub fn is_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline_at
    }

    /// Tie-break order among competing active rows.
    fn precedence(&self) -> (DateTime<Utc>, DeadlineId) {
        (self.updated_at, self.id)
    }
}

/// Pick the winning active deadline for `(year, stage)` out of `rows`.
pub fn select_active<'a>(
    rows: impl IntoIterator<Item = &'a Deadline>,
    year: Year,
    stage: &str,
) -> Option<&'a Deadline> {
    rows.into_iter()
        .filter(|d| d.is_active && d.year == year && same_stage(&d.stage, stage))
        .max_by_key(|d| d.precedence())
}

/// Write request for a deadline (upsert by `(year, stage)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineUpdate {
    pub year: Year,
    pub stage: String,
    pub deadline_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

impl DeadlineUpdate {
    pub fn validate(&self) -> Result<(), SlhdError> {
        validate_year(self.year)?;
        if self.stage.trim().is_empty() {
            return Err(SlhdError::InvalidInput("stage must not be empty".into()));
        }
        Ok(())
    }
}

/// Read access to deadlines.
pub trait DeadlineStore {
    /// The winning active deadline for `(year, stage)`.
    fn active_deadline(&self, year: Year, stage: &str) -> Result<Option<Deadline>, SlhdError>;
}

// =============================================================================
// DEADLINE INFO (projection)
// =============================================================================

/// Deadline as attached to timeline entries and stage polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineInfo {
    pub deadline_at: DateTime<Utc>,
    /// `YYYY-MM-DD HH:MM:SS`
    pub date: String,
    /// `DD <Month> YYYY` with Indonesian month names.
    pub date_formatted: String,
    pub is_passed: bool,
}

impl DeadlineInfo {
    #[must_use]
    pub fn from_deadline(deadline: &Deadline, now: DateTime<Utc>) -> Self {
        Self {
            deadline_at: deadline.deadline_at,
            date: deadline.deadline_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            date_formatted: format_long_date(deadline.deadline_at),
            is_passed: deadline.is_passed(now),
        }
    }
}

/// The submission deadline of a year as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineView {
    pub year: Year,
    pub deadline: Option<DeadlineInfo>,
    pub note: Option<String>,
    pub is_passed: bool,
}

impl DeadlineView {
    /// An absent row yields nulls and `is_passed = false`.
    #[must_use]
    pub fn new(year: Year, deadline: Option<&Deadline>, now: DateTime<Utc>) -> Self {
        let info = deadline.map(|d| DeadlineInfo::from_deadline(d, now));
        Self {
            year,
            is_passed: info.as_ref().is_some_and(|i| i.is_passed),
            note: deadline.and_then(|d| d.note.clone()),
            deadline: info,
        }
    }
}

/// Long date with Indonesian month name, e.g. `01 Maret 2026`.
#[must_use]
pub fn format_long_date(at: DateTime<Utc>) -> String {
    let month = MONTHS_ID
        .get(at.month0() as usize)
        .copied()
        .unwrap_or_default();
    format!("{:02} {} {}", at.day(), month, at.year())
}

// =============================================================================
// TESTS
// =============================================================================
