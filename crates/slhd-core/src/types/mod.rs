//! # Core Type Definitions
//!
//! This module contains the records the SLHD program is built from:
//! - Identifiers (`UserId`, `DinasId`, `SubmissionId`, `DeadlineId`, `LogId`)
//! - Accounts and agencies (`User`, `Role`, `Dinas`, `RegionType`, `DinasStatus`)
//! - Annual work items (`Submission`, `SubmissionStatus`, `Evaluation`)
//! - Error types (`SlhdError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are used as `BTreeMap` keys
//! - Carry timestamps as `DateTime<Utc>`; no type reads the clock itself

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A program year (e.g. 2026).
pub type Year = i32;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Identifier of a dinas (regional environmental agency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DinasId(pub u64);

/// Identifier of a yearly submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub u64);

/// Identifier of a deadline row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeadlineId(pub u64);

impl DeadlineId {
    /// The id after this one; the top of the id space has none.
    pub fn successor(self) -> Result<Self, SlhdError> {
        self.0.checked_add(1).map(Self).ok_or_else(|| {
            SlhdError::InvalidInput(format!("deadline id {} is the last one", self.0))
        })
    }
}

/// Identifier of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogId(pub u64);

// =============================================================================
// ROLES & AGENCIES
// =============================================================================

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    /// Central data team that runs the assessment.
    #[serde(rename = "pusdatin")]
    Pusdatin,
    /// Provincial dinas account.
    #[serde(rename = "provinsi")]
    Provinsi,
    /// City/regency dinas account.
    #[serde(rename = "kabupaten/kota")]
    KabupatenKota,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Pusdatin => "pusdatin",
            Role::Provinsi => "provinsi",
            Role::KabupatenKota => "kabupaten/kota",
        }
    }

    /// True for the two agency account roles.
    #[must_use]
    pub fn is_dinas(&self) -> bool {
        matches!(self, Role::Provinsi | Role::KabupatenKota)
    }
}

impl FromStr for Role {
    type Err = SlhdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "pusdatin" => Ok(Role::Pusdatin),
            "provinsi" => Ok(Role::Provinsi),
            "kabupaten/kota" | "kabupaten" | "kabkota" | "kota" => Ok(Role::KabupatenKota),
            other => Err(SlhdError::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrative level of the region a dinas belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    Provinsi,
    Kabupaten,
    Kota,
}

impl RegionType {
    /// Cities and regencies are reported together.
    #[must_use]
    pub fn is_kabupaten_kota(&self) -> bool {
        matches!(self, RegionType::Kabupaten | RegionType::Kota)
    }
}

/// Registration state of a dinas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DinasStatus {
    Terdaftar,
    #[default]
    BelumTerdaftar,
}

/// A regional environmental agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dinas {
    pub id: DinasId,
    pub name: String,
    pub code: String,
    pub region_type: RegionType,
    pub region_name: String,
    #[serde(default)]
    pub status: DinasStatus,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub dinas_id: Option<DinasId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SUBMISSIONS & EVALUATIONS
// =============================================================================

/// Lifecycle state of a yearly submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Finalized,
    Approved,
}

impl SubmissionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Finalized => "finalized",
            SubmissionStatus::Approved => "approved",
        }
    }
}

/// A dinas' document package for one program year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub dinas_id: DinasId,
    pub year: Year,
    pub status: SubmissionStatus,
    /// Environmental quality index, hundredths (7250 = 72.50).
    #[serde(default)]
    pub iklh_hundredths: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Assessment recap for one dinas in one year.
///
/// Each flag records whether the dinas cleared that stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub year: Year,
    pub dinas_id: DinasId,
    #[serde(default)]
    pub passed_screening: bool,
    #[serde(default)]
    pub award_shortlist: bool,
    #[serde(default)]
    pub passed_validation_1: bool,
    #[serde(default)]
    pub passed_validation_2: bool,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the SLHD core.
///
/// Every failure is scoped to a single request; nothing here is fatal to
/// the process. A missing stage record is not an error (it defaults).
#[derive(Debug, Error)]
pub enum SlhdError {
    /// Caller-supplied data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The storage collaborator could not serve the request.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SlhdError {
    /// Wrap any storage-layer error.
    pub(crate) fn storage(e: impl std::fmt::Display) -> Self {
        SlhdError::StorageUnavailable(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
