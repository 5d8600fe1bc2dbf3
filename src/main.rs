//! # Main — CLI Entry Point
//!
//! Routes CLI subcommands to the portal server and maintenance operations.
//! Handles shared concerns: structured logging setup, environment loading,
//! and the database connection.
//!
//! ## Subcommands
//!
//! - `portal` — run the member-facing web server.
//! - `recompute` — rebuild derived state (points, direction progress, totem
//!   grants) from the ledger for one participant or all of them.
//! - `stream` — list cohorts, create one, or swap the current pointer.
//! - `grant` — admin totem grant (idempotent escape hatch).
//!
//! ## Global Options
//!
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection (Supabase).

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kemp", about = "КЭМП intensive backend — ledger, aggregation, totems, portal")]
struct Cli {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the member portal web server
    Portal {
        /// HTTP listen port
        #[arg(long, default_value_t = 7300)]
        port: u16,
    },
    /// Rebuild derived state from the activity ledger
    Recompute {
        /// Participant to recompute (mutually exclusive with --all)
        #[arg(long, conflicts_with = "all")]
        participant: Option<uuid::Uuid>,
        /// Recompute every participant
        #[arg(long)]
        all: bool,
    },
    /// Manage program streams (cohorts)
    Stream {
        #[command(subcommand)]
        action: StreamAction,
    },
    /// Grant a totem directly (admin escape hatch, idempotent)
    Grant {
        /// Participant id
        #[arg(long)]
        participant: uuid::Uuid,
        /// Totem type code (e.g. snake, blade)
        #[arg(long)]
        totem: String,
    },
}

#[derive(Subcommand)]
enum StreamAction {
    /// List all streams
    List,
    /// Create a stream (not current until explicitly set)
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        starts_on: chrono::NaiveDate,
        #[arg(long)]
        ends_on: chrono::NaiveDate,
    },
    /// Mark a stream as the single current one
    SetCurrent {
        /// Stream id
        id: uuid::Uuid,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize structured logging: LOG_FORMAT=json for K8s, human-readable otherwise
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_target(false).init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Portal { port } => cli::run_portal(&cli, *port),
        Commands::Recompute { participant, all } => cli::run_recompute(&cli, *participant, *all),
        Commands::Stream { action } => cli::run_stream(&cli, action),
        Commands::Grant { participant, totem } => cli::run_grant(&cli, *participant, totem),
    }
}
