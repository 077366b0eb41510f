//! # CLI Command Implementations
//!
//! Each command opens the configured backend, runs one core operation and
//! prints the result either as text or, with `--json-mode`, as JSON.

use super::Backend;
use crate::api;
use crate::config::ServerConfig;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use slhd_core::pipeline::StageStatistics;
use slhd_core::primitives::validate_year;
use slhd_core::{
    ActivityLog, DeadlineInfo, DeadlineUpdate, LogFilter, Page, RequestMeta, Session, SlhdError,
    Snapshot, Year,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Maximum snapshot file size (100 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 100 * 1024 * 1024;

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), SlhdError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| SlhdError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(SlhdError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, SlhdError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| SlhdError::Io(format!("Invalid file path '{}': {}", path.display(), e)))?;

    if !canonical.is_file() {
        return Err(SlhdError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

/// Read and parse a JSON snapshot file.
pub fn read_snapshot(file: &Path) -> Result<Snapshot, SlhdError> {
    let path = validate_file_path(file)?;
    validate_file_size(&path, MAX_SNAPSHOT_FILE_SIZE)?;

    let contents = std::fs::read(&path)
        .map_err(|e| SlhdError::Io(format!("Read '{}': {}", path.display(), e)))?;
    serde_json::from_slice(&contents)
        .map_err(|e| SlhdError::Serialization(format!("Invalid snapshot: {}", e)))
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<(), SlhdError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SlhdError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn describe_deadline(info: Option<&DeadlineInfo>) -> String {
    match info {
        Some(d) if d.is_passed => format!("{} (passed)", d.date_formatted),
        Some(d) => format!("{} ({})", d.date_formatted, d.date),
        None => "not set".to_string(),
    }
}

fn describe_statistics(stats: &StageStatistics) -> String {
    match *stats {
        StageStatistics::Submission {
            total_submissions,
            finalized,
        } => format!("{} submitted, {} finalized", total_submissions, finalized),
        StageStatistics::Screening {
            total_evaluated,
            passed,
            not_passed,
        } => format!(
            "{} evaluated, {} passed, {} not passed",
            total_evaluated, passed, not_passed
        ),
        StageStatistics::Award {
            total_participants,
            advanced_to_award,
        } => format!(
            "{} participants, {} to award",
            total_participants, advanced_to_award
        ),
        StageStatistics::Validation {
            total_participants,
            passed,
            not_passed,
        } => format!(
            "{} participants, {} passed, {} not passed",
            total_participants, passed, not_passed
        ),
        StageStatistics::Interview { total_participants } => {
            format!("{} participants", total_participants)
        }
    }
}

fn resolve_year(year: Option<Year>) -> Result<Year, SlhdError> {
    validate_year(year.unwrap_or_else(|| Utc::now().year()))
}

/// Parse an RFC 3339 instant into UTC.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, SlhdError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SlhdError::InvalidInput(format!("invalid instant '{}': {}", raw, e)))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Server flags layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub seed: Option<PathBuf>,
}

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    backend: Backend,
    options: ServerOptions,
) -> Result<(), SlhdError> {
    let mut config = ServerConfig::load(options.config.as_deref())?;
    if let Some(host) = options.host {
        config.host = host;
    }
    if let Some(port) = options.port {
        config.port = port;
    }

    let mut session = load_or_create_session(db_path, backend)?;
    if let Some(seed) = &options.seed {
        let report = session.load_snapshot(&read_snapshot(seed)?)?;
        println!("Seeded {} records from {}", report.total(), seed.display());
    }

    println!("SLHD Administration Backend Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:    {}", config.bind_addr());
    println!("  Backend:    {:?}", backend);
    if session.is_persistent() {
        println!("  Database:   {}", db_path.display());
    } else {
        println!("  Database:   (in memory, discarded on exit)");
    }
    println!("  Rate limit: {} req/s", config.rate_limit);
    println!("  Dashboard cache: {} s", config.dashboard_cache_secs);
    println!(
        "  API key:    {}",
        if api::get_api_key_from_env().is_some() {
            "required"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(session, config).await
}

// =============================================================================
// INIT & INGEST
// =============================================================================

/// Create an empty database.
pub fn cmd_init(db_path: &Path, backend: Backend, force: bool) -> Result<(), SlhdError> {
    if backend == Backend::Memory {
        println!("Memory backend keeps no files; nothing to initialize");
        return Ok(());
    }
    if db_path.exists() {
        if !force {
            return Err(SlhdError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path).map_err(|e| {
            SlhdError::Io(format!("Cannot remove '{}': {}", db_path.display(), e))
        })?;
    }

    Session::with_redb(db_path)?;
    println!("Initialized new redb database at {}", db_path.display());
    Ok(())
}

/// Load a JSON snapshot into the backend.
pub fn cmd_ingest(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    file: &Path,
) -> Result<(), SlhdError> {
    tracing::info!("Ingesting snapshot from {}", file.display());

    let snapshot = read_snapshot(file)?;
    let mut session = load_or_create_session(db_path, backend)?;
    let report = session.load_snapshot(&snapshot)?;

    if json_mode {
        return print_json(&report);
    }
    println!("Loaded {} records:", report.total());
    println!("  Stage records: {}", report.stage_statuses);
    println!("  Deadlines:     {}", report.deadlines);
    println!("  Dinas:         {}", report.dinas);
    println!("  Users:         {}", report.users);
    println!("  Submissions:   {}", report.submissions);
    println!("  Evaluations:   {}", report.evaluations);
    Ok(())
}

// =============================================================================
// STAGE, TIMELINE & DEADLINE
// =============================================================================

/// Show the active stage of a year.
pub fn cmd_stage(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    year: Option<Year>,
) -> Result<(), SlhdError> {
    let session = load_or_create_session(db_path, backend)?;
    let report = session.stage_report(resolve_year(year)?, Utc::now())?;

    if json_mode {
        return print_json(&report);
    }
    println!("SLHD Stage {}", report.year);
    println!("==============");
    println!();
    println!("Active Stage: {} ({})", report.label, report.stage_id);
    println!("Rank:         {} / 7", report.rank);
    println!("Note:         {}", report.note);
    println!(
        "Announcement: {}",
        if report.announcement_open {
            "open"
        } else {
            "closed"
        }
    );
    if let Some(started) = report.stage_started_at {
        println!("Started:      {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("Deadline:     {}", describe_deadline(report.deadline.as_ref()));
    Ok(())
}

/// Show the seven-stage timeline of a year.
pub fn cmd_timeline(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    year: Option<Year>,
) -> Result<(), SlhdError> {
    let session = load_or_create_session(db_path, backend)?;
    let timeline = session.timeline(resolve_year(year)?, Utc::now())?;

    if json_mode {
        return print_json(&timeline);
    }
    println!(
        "SLHD Timeline {} - {} ({}%)",
        timeline.year, timeline.active_stage_label, timeline.progress_percentage
    );
    println!();
    for entry in &timeline.timeline {
        let stats = entry
            .statistics
            .as_ref()
            .map(describe_statistics)
            .unwrap_or_default();
        println!(
            "  {}. {:<32} {:<10} {}",
            entry.order,
            entry.label,
            format!("{:?}", entry.status).to_lowercase(),
            stats
        );
        if entry.deadline.is_some() {
            println!(
                "     deadline: {}",
                describe_deadline(entry.deadline.as_ref())
            );
        }
    }
    println!();
    println!(
        "Registered agencies: {}",
        timeline.summary.total_registered_agencies
    );
    for warning in &timeline.data_warnings {
        println!("Warning: {}", warning);
    }
    Ok(())
}

/// Show the submission deadline of a year.
pub fn cmd_deadline(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    year: Option<Year>,
) -> Result<(), SlhdError> {
    let session = load_or_create_session(db_path, backend)?;
    let view = session.deadline_view(resolve_year(year)?, Utc::now())?;

    if json_mode {
        return print_json(&view);
    }
    println!(
        "Submission deadline {}: {}",
        view.year,
        describe_deadline(view.deadline.as_ref())
    );
    if let Some(note) = &view.note {
        println!("Note: {}", note);
    }
    Ok(())
}

/// Upsert a deadline as a system action.
pub fn cmd_set_deadline(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    year: Option<Year>,
    at: &str,
    stage: String,
    note: Option<String>,
) -> Result<(), SlhdError> {
    let update = DeadlineUpdate {
        year: year.unwrap_or_else(|| Utc::now().year()),
        stage,
        deadline_at: parse_instant(at)?,
        note,
    };
    let meta = RequestMeta {
        ip_address: None,
        user_agent: Some(format!("slhd-cli/{}", env!("CARGO_PKG_VERSION"))),
    };

    let mut session = load_or_create_session(db_path, backend)?;
    let row = session.set_deadline(None, &update, meta, Utc::now())?;

    if json_mode {
        return print_json(&row);
    }
    println!(
        "Deadline for {} {} set to {}",
        row.stage,
        row.year,
        row.deadline_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

// =============================================================================
// LOGS
// =============================================================================

/// List activity log entries.
pub fn cmd_logs(
    db_path: &Path,
    backend: Backend,
    json_mode: bool,
    filter: &LogFilter,
) -> Result<(), SlhdError> {
    let session = load_or_create_session(db_path, backend)?;
    let page: Page<ActivityLog> = session.logs(filter)?;

    if json_mode {
        let page = api::LogPageResponse::from(page);
        return print_json(&page);
    }
    println!(
        "Activity log: page {} of {} ({} entries)",
        page.current_page, page.last_page, page.total
    );
    for entry in &page.data {
        let actor = entry
            .actor
            .map(|a| format!("user {} ({})", a.user_id.0, a.role))
            .unwrap_or_else(|| "system".to_string());
        println!(
            "  #{:<5} {} [{}] {} - {}",
            entry.id.0,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.context.as_str(),
            actor,
            entry.description
        );
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the session for the chosen backend.
pub fn load_or_create_session(db_path: &Path, backend: Backend) -> Result<Session, SlhdError> {
    match backend {
        Backend::Redb => Session::with_redb(db_path),
        Backend::Memory => Ok(Session::new()),
    }
}
