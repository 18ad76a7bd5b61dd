// Gaffer entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Dispatch the subcommand; `run` keeps the background jobs going until Ctrl+C

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use gaffer_core::config;
use gaffer_core::db::Database;
use gaffer_core::import;
use gaffer_core::jobs::{self, PriceRules};
use gaffer_core::league::{Caller, League};
use gaffer_core::merge;

#[derive(Debug, Parser)]
#[command(name = "gaffer", version, about = "Fantasy football scoring and roster engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run deadline stamping and the price sweep on an interval until Ctrl+C.
    Run,
    /// Stamp deadlines and price finished matches once, then exit.
    Sweep,
    /// Load players from a CSV file (`name,position,team_id,price`).
    ImportPlayers { path: PathBuf },
    /// Fold a duplicate player into the canonical one.
    MergePlayers { duplicate: i64, canonical: i64 },
    /// Recompute fantasy points for a finished match.
    Reprocess { match_id: i64 },
}

/// What one pass of the background jobs did.
#[derive(Debug, Default, PartialEq, Eq)]
struct JobSummary {
    deadlines_set: usize,
    price_changes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Initialize tracing
    init_tracing()?;
    info!("Gaffer starting up: {:?}", cli.command);

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, competition {}, budget {}",
        config.league.name, config.league.competition_id, config.league.budget
    );

    // 3. Open database
    let db_path = config::resolve_db_path(&config).context("failed to resolve database path")?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_path_str = db_path
        .to_str()
        .with_context(|| format!("database path {} is not valid UTF-8", db_path.display()))?;
    let db = Database::open(db_path_str).context("failed to open database")?;
    info!("Database opened at {}", db_path.display());

    // 4. Dispatch
    match cli.command {
        Command::Run => {
            let period = Duration::from_secs(config.jobs.poll_interval_secs.max(1));
            info!("Background jobs running every {:?}", period);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
            };
            let passes = job_loop(Arc::new(db), config.pricing.clone(), period, shutdown).await;
            info!("Gaffer shut down cleanly after {} job passes", passes);
        }
        Command::Sweep => {
            let summary = run_jobs(&db, &config.pricing, Utc::now())?;
            println!(
                "{} deadlines set, {} price changes",
                summary.deadlines_set, summary.price_changes
            );
        }
        Command::ImportPlayers { path } => {
            let ids = import::import_players(&db, &path)?;
            println!("imported {} players", ids.len());
        }
        Command::MergePlayers {
            duplicate,
            canonical,
        } => {
            let report = merge::merge_players(&db, duplicate, canonical)?;
            println!(
                "merged player {duplicate} into {canonical}: {} matches, {} teams rewritten",
                report.matches_rewritten, report.teams_rewritten
            );
        }
        Command::Reprocess { match_id } => {
            let league = League::new(db, config);
            let report = league.reprocess_match(&Caller::admin(0), match_id, Utc::now())?;
            println!(
                "match {match_id} (gameweek {}): {} players scored, {} teams updated, {} skipped",
                report.gameweek,
                report.player_points.len(),
                report.team_points.len(),
                report.skipped_teams.len()
            );
        }
    }
    Ok(())
}

/// One pass of the periodic jobs: fill in gameweek deadlines, then price
/// any finished matches.
fn run_jobs(
    db: &Database,
    pricing: &PriceRules,
    now: DateTime<Utc>,
) -> anyhow::Result<JobSummary> {
    let deadlines = jobs::set_deadlines(db, now).context("deadline job failed")?;
    let changes = jobs::run_price_sweep(db, pricing).context("price sweep failed")?;
    Ok(JobSummary {
        deadlines_set: deadlines.len(),
        price_changes: changes.len(),
    })
}

/// Run `run_jobs` on every tick until `shutdown` resolves. A failing pass is
/// logged and the loop carries on. Returns the number of passes made.
async fn job_loop(
    db: Arc<Database>,
    pricing: PriceRules,
    period: Duration,
    shutdown: impl Future<Output = ()>,
) -> usize {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut passes = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping background jobs");
                break;
            }
            _ = ticker.tick() => {
                let db = Arc::clone(&db);
                let pricing = pricing.clone();
                let pass = tokio::task::spawn_blocking(move || run_jobs(&db, &pricing, Utc::now()));
                match pass.await {
                    Ok(Ok(summary)) => {
                        if summary != JobSummary::default() {
                            info!(
                                "Job pass: {} deadlines set, {} price changes",
                                summary.deadlines_set, summary.price_changes
                            );
                        }
                    }
                    Ok(Err(e)) => error!("Job pass failed: {:#}", e),
                    Err(e) => error!("Job pass panicked: {}", e),
                }
                passes += 1;
            }
        }
    }
    passes
}

/// Initialize tracing to log to a file under `logs/`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gaffer.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gaffer=info,gaffer_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
