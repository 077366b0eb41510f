//! # SLHD - Administration Backend
//!
//! The binary of the SLHD assessment administration backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 apps/slhd (THE BINARY)              │
//! │                                                     │
//! │   ┌─────────────┐    ┌─────────────────────────┐    │
//! │   │    CLI      │    │  HTTP API (axum)        │    │
//! │   │   (clap)    │    │  + dashboard cache      │    │
//! │   └──────┬──────┘    └────────────┬────────────┘    │
//! │          └──────────────┬─────────┘                 │
//! │                         ▼                           │
//! │                 ┌───────────────┐                   │
//! │                 │   slhd-core   │                   │
//! │                 │  (THE LOGIC)  │                   │
//! │                 └───────────────┘                   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! slhd init
//! slhd ingest -f snapshot.json
//! slhd server --config slhd.toml
//! slhd timeline --year 2026
//! ```

use clap::Parser;
use slhd::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // SLHD_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("SLHD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "slhd=debug,tower_http=debug"
    } else {
        "slhd=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  ███████╗██╗     ██╗  ██╗██████╗
  ██╔════╝██║     ██║  ██║██╔══██╗
  ███████╗██║     ███████║██║  ██║
  ╚════██║██║     ██╔══██║██║  ██║
  ███████║███████╗██║  ██║██████╔╝
  ╚══════╝╚══════╝╚═╝  ╚═╝╚═════╝

  Administration Backend v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
