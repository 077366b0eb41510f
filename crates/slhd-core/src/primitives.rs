//! # Program Constants
//!
//! Fixed values of the SLHD program compiled into the binary.

/// Number of stages in the annual assessment pipeline.
pub const STAGE_COUNT: u8 = 7;

/// Stage tag used for the submission deadline.
pub const SUBMISSION_STAGE_TAG: &str = "submission";

/// Note reported for a year whose pipeline has not been started.
pub const DEFAULT_STAGE_NOTE: &str = "awaiting process start";

/// Default page size for activity log listings.
pub const DEFAULT_LOG_PAGE_SIZE: usize = 25;

/// Upper bound on any page or feed size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Default number of entries in the recent-activity feed.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Accepted program years.
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

/// Default lifetime of a cached dashboard snapshot, in seconds.
pub const DASHBOARD_CACHE_SECS: u64 = 600;

/// Maximum number of records accepted in a single snapshot ingest.
pub const MAX_SNAPSHOT_RECORDS: usize = 200_000;

/// Validate that a year is inside the accepted program range.
pub fn validate_year(year: i32) -> Result<i32, crate::SlhdError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(crate::SlhdError::InvalidInput(format!(
            "year {} outside {}..={}",
            year, MIN_YEAR, MAX_YEAR
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_bounds_are_inclusive() {
        assert!(validate_year(MIN_YEAR).is_ok());
        assert!(validate_year(MAX_YEAR).is_ok());
        assert!(validate_year(1999).is_err());
        assert!(validate_year(2101).is_err());
    }
}
