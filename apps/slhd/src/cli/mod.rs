//! # SLHD CLI Module
//!
//! Command line interface of the SLHD administration backend.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `ingest` - Load a JSON snapshot
//! - `stage` - Show the active stage of a year
//! - `timeline` - Show the seven-stage timeline of a year
//! - `deadline` - Show the submission deadline of a year
//! - `set-deadline` - Upsert a deadline
//! - `logs` - List activity log entries

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use slhd_core::{SlhdError, Year};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// SLHD administration backend
///
/// Stage tracking, deadlines, dashboards and the audit trail of the
/// annual regional environmental assessment.
#[derive(Parser, Debug)]
#[command(name = "slhd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database
    #[arg(short = 'D', long, global = true, default_value = "slhd.db")]
    pub database: PathBuf,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// TOML file with a [server] table
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where program data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// ACID database file (redb)
    Redb,
    /// Volatile, process-local maps
    Memory,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Snapshot to load before serving
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Initialize a new empty database
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Load a JSON snapshot into the database
    Ingest {
        /// Path to the snapshot file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the active stage of a year
    Stage {
        /// Program year (default: current year)
        #[arg(short, long)]
        year: Option<Year>,
    },

    /// Show the seven-stage timeline of a year
    Timeline {
        /// Program year (default: current year)
        #[arg(short, long)]
        year: Option<Year>,
    },

    /// Show the submission deadline of a year
    Deadline {
        /// Program year (default: current year)
        #[arg(short, long)]
        year: Option<Year>,
    },

    /// Create or move a deadline
    SetDeadline {
        /// Program year (default: current year)
        #[arg(short, long)]
        year: Option<Year>,

        /// Deadline instant, RFC 3339 (e.g. 2026-03-01T00:00:00Z)
        #[arg(long)]
        at: String,

        /// Stage the deadline belongs to
        #[arg(short, long, default_value = "submission")]
        stage: String,

        /// Free-text note shown with the deadline
        #[arg(short, long)]
        note: Option<String>,
    },

    /// List activity log entries, newest first
    Logs {
        /// Audience or actor role ("all", "admin", "pusdatin", "dinas", ...)
        #[arg(short, long)]
        role: Option<String>,

        /// Only entries of this year
        #[arg(short, long)]
        year: Option<Year>,

        /// Page number, starting at 1
        #[arg(short, long)]
        page: Option<usize>,

        /// Entries per page
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), SlhdError> {
    let db = cli.database.as_path();
    let backend = cli.backend;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port, seed }) => {
            let options = ServerOptions {
                config: cli.config,
                host,
                port,
                seed,
            };
            cmd_server(db, backend, options).await
        }
        Some(Commands::Init { force }) => cmd_init(db, backend, force),
        Some(Commands::Ingest { file }) => cmd_ingest(db, backend, json_mode, &file),
        Some(Commands::Stage { year }) => cmd_stage(db, backend, json_mode, year),
        Some(Commands::Timeline { year }) => cmd_timeline(db, backend, json_mode, year),
        Some(Commands::Deadline { year }) => cmd_deadline(db, backend, json_mode, year),
        Some(Commands::SetDeadline {
            year,
            at,
            stage,
            note,
        }) => cmd_set_deadline(db, backend, json_mode, year, &at, stage, note),
        Some(Commands::Logs {
            role,
            year,
            page,
            limit,
        }) => {
            let filter = slhd_core::LogFilter {
                role,
                year,
                page,
                limit,
            };
            cmd_logs(db, backend, json_mode, &filter)
        }
        // No subcommand: show the current stage
        None => cmd_stage(db, backend, json_mode, None),
    }
}
