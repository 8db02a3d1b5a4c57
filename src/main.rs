//! Command line entry point for the Versus battle engine
//!
//! Loads configuration, builds a battle service over a catalog file, and runs a
//! simulated session of battles for one user, printing the resulting ranking.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use versus_engine::catalog::{
    InMemoryCatalog, MetadataProvider, OmdbMetadataProvider, StaticMetadataProvider,
};
use versus_engine::config::AppConfig;
use versus_engine::error::battle_error;
use versus_engine::random::{SeededRandom, SharedRandom, ThreadRandom};
use versus_engine::rating::InMemoryRatingStore;
use versus_engine::{
    BattleError, BattleOutcome, BattleService, CancelHandle, RankingMetric, ServiceComponents,
};

/// Versus Engine - pairwise battles with ELO ranking
#[derive(Parser)]
#[command(
    name = "versus-engine",
    version,
    about = "Matchmaking and ELO rating engine for pairwise item battles",
    long_about = "Versus Engine pairs catalog items for head-to-head battles, steers pairing by \
                 each user's progress, resolves items against a metadata provider, and keeps a \
                 per-user ELO ranking. This binary runs a simulated session against a catalog file."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Catalog file: one title per line, or CSV with a Title column
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// User to simulate
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Number of battles to run
    #[arg(short, long, default_value_t = 10)]
    battles: u32,

    /// Seed for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,

    /// Number of entries in the final ranking
    #[arg(long, default_value_t = 20)]
    top: usize,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Print Prometheus metrics after the session
    #[arg(long)]
    metrics: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without running a session")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration from file or environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    versus_engine::config::validate_config(&config)?;
    Ok(config)
}

fn display_startup_banner(config: &AppConfig) {
    info!("Versus Engine {}", versus_engine::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Provider: {}",
        if config.resolver.omdb_api_key.is_some() {
            "omdb"
        } else {
            "static"
        }
    );
    info!(
        "   Special selection timeout: {}ms",
        config.selection.special_timeout_ms
    );
    info!(
        "   ELO: k={}, initial={}, scale={}",
        config.rating.k_factor, config.rating.initial_rating, config.rating.scale
    );
}

fn build_service(config: &AppConfig, args: &Args) -> Result<BattleService> {
    let catalog_path = args
        .catalog
        .as_ref()
        .ok_or_else(|| anyhow!("A catalog file is required (--catalog)"))?;

    let random: SharedRandom = match args.seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };

    let catalog = InMemoryCatalog::from_file(catalog_path, random.clone())?;
    if catalog.is_empty() {
        return Err(BattleError::CatalogEmpty.into());
    }
    info!("Loaded {} catalog titles", catalog.titles().len());

    let store = InMemoryRatingStore::with_titles(catalog.titles().iter().cloned());

    let provider: Arc<dyn MetadataProvider> = match &config.resolver.omdb_api_key {
        Some(key) => Arc::new(OmdbMetadataProvider::new(
            key.clone(),
            config.resolver.omdb_base_url.clone(),
        )?),
        None => Arc::new(StaticMetadataProvider::permissive()),
    };

    BattleService::new(
        config.clone(),
        ServiceComponents {
            sampler: Arc::new(catalog),
            provider,
            store: Arc::new(store),
            random,
        },
    )
}

/// Run the simulated session; the simulated user picks winners at random
async fn run_session(
    service: &BattleService,
    args: &Args,
    cancel: &CancelHandle,
    chooser: SharedRandom,
) -> Result<u32> {
    let signal = cancel.signal();
    let mut completed = 0;

    for round in 1..=args.battles {
        let pair = match service.select_pair(&args.user, &signal).await {
            Ok(pair) => pair,
            Err(e) if matches!(battle_error(&e), Some(BattleError::Cancelled)) => {
                warn!("Session cancelled after {} battles", completed);
                break;
            }
            Err(e) => return Err(e),
        };

        let item_a_wins = chooser.pick_index(2) == 0;
        let outcome = BattleOutcome::for_pair(&pair, item_a_wins);

        match service.apply_outcome(&args.user, &outcome, &signal).await {
            Ok(update) => {
                println!(
                    "#{:<3} [{}] {} vs {} -> {} ({} -> {})",
                    round,
                    pair.strategy,
                    pair.item_a.title,
                    pair.item_b.title,
                    outcome.winner.title,
                    update.winner_before.elo_rating,
                    update.winner_after.elo_rating
                );
                completed += 1;
            }
            Err(e) if matches!(battle_error(&e), Some(BattleError::Cancelled)) => {
                warn!("Session cancelled after {} battles", completed);
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(completed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without running a session");
        return Ok(());
    }

    display_startup_banner(&config);

    let service = match build_service(&config, &args) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            std::process::exit(1);
        }
    };

    let prune_task = service.start_prune_task();

    // Ctrl+C cancels in-flight engine calls
    let cancel = Arc::new(CancelHandle::new());
    let signal_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT (Ctrl+C) signal");
                cancel.cancel();
            }
        })
    };

    let chooser: SharedRandom = match args.seed {
        Some(seed) => Arc::new(SeededRandom::new(seed.wrapping_add(1))),
        None => Arc::new(ThreadRandom),
    };

    let result = run_session(&service, &args, &cancel, chooser).await;

    signal_task.abort();
    prune_task.abort();

    let completed = match result {
        Ok(completed) => completed,
        Err(e) => {
            error!("Session failed: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("Ranking for '{}' after {} battles:", args.user, completed);
    let top = service
        .top_items(&args.user, RankingMetric::EloRating, args.top)
        .await?;
    for (rank, record) in top.iter().enumerate() {
        println!(
            "  {:>2}. {:<40} {:>5}  ({}W / {}L)",
            rank + 1,
            record.title,
            record.elo_rating,
            record.win_count,
            record.loss_count
        );
    }

    if args.metrics {
        println!();
        print!("{}", service.metrics().encode_text()?);
    }

    Ok(())
}
