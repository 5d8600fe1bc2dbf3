//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Contains the
//! execution logic for each subcommand: the portal server, recompute sweeps,
//! stream management, and admin totem grants.

use anyhow::Result;
use kemp::{db, portal, recompute};
use tracing::info;

use super::{Cli, StreamAction};

fn require_database_url(cli: &Cli) -> Result<&str> {
    cli.database_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)")
    })
}

/// Run the member portal web server until shutdown.
pub fn run_portal(cli: &Cli, port: u16) -> Result<()> {
    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(portal::run(port, database_url))
}

/// Rebuild derived state from the ledger for one participant or all.
pub fn run_recompute(cli: &Cli, participant: Option<uuid::Uuid>, all: bool) -> Result<()> {
    anyhow::ensure!(
        participant.is_some() || all,
        "specify --participant <id> or --all"
    );
    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let db = db::Database::connect(database_url).await?;
        match (participant, all) {
            (Some(id), _) => {
                let outcome = recompute::recompute_participant(&db, id, None, None)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("participant {id} not found"))?;
                info!(
                    participant = %id,
                    points = outcome.aggregates.total_points,
                    newly_granted = ?outcome.newly_granted,
                    "recompute complete"
                );
                Ok(())
            }
            (None, true) => {
                let n = recompute::recompute_all(&db, None, None).await?;
                info!(participants = n, "recompute sweep complete");
                Ok(())
            }
            (None, false) => unreachable!("checked above"),
        }
    })
}

/// Stream management: list, create, set-current.
pub fn run_stream(cli: &Cli, action: &StreamAction) -> Result<()> {
    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let db = db::Database::connect(database_url).await?;
        match action {
            StreamAction::List => {
                let streams = db.get_streams().await?;
                for s in &streams {
                    println!(
                        "{} {} {} — {}{}",
                        s.id,
                        s.name,
                        s.starts_on,
                        s.ends_on,
                        if s.is_current { " [current]" } else { "" }
                    );
                }
                Ok(())
            }
            StreamAction::Create {
                name,
                starts_on,
                ends_on,
            } => {
                anyhow::ensure!(ends_on >= starts_on, "ends_on must not precede starts_on");
                let row = db.create_stream(name, *starts_on, *ends_on).await?;
                info!(stream = %row.id, name = %row.name, "stream created");
                println!("{}", row.id);
                Ok(())
            }
            StreamAction::SetCurrent { id } => {
                if db.set_current_stream(*id).await? {
                    info!(stream = %id, "current stream switched");
                    Ok(())
                } else {
                    anyhow::bail!("stream {id} not found")
                }
            }
        }
    })
}

/// Admin totem grant. Idempotent: granting an already-earned totem reports
/// the fact and exits successfully.
pub fn run_grant(cli: &Cli, participant: uuid::Uuid, totem: &str) -> Result<()> {
    let database_url = require_database_url(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let db = db::Database::connect(database_url).await?;
        let known = db
            .get_totem_requirements()
            .await?
            .iter()
            .any(|r| r.totem_type == totem);
        anyhow::ensure!(known, "unknown totem type '{totem}'");
        db.get_participant(participant)
            .await?
            .ok_or_else(|| anyhow::anyhow!("participant {participant} not found"))?;
        match db.grant_totem(participant, totem).await? {
            Some(row) => {
                info!(participant = %participant, totem, earned_at = %row.earned_at, "totem granted");
            }
            None => {
                info!(participant = %participant, totem, "totem already earned, nothing to do");
            }
        }
        Ok(())
    })
}
