//! Listing bot CLI
//!
//! Runs the poll loop and operator console, or inspects the store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use listing_bot::{
    BotContext,
    commands::run_console,
    config::{build_platform, load_config, open_store},
    error::{AppError, Result},
    models::BotConfig,
    pipeline::Poller,
    storage::ListingStore,
};

/// Posts new marketplace listings to chat channels
#[derive(Parser, Debug)]
#[command(name = "listing-bot", version, about = "Listing notification bot")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = "bot_cfg.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log listings instead of posting them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll until stopped, with the operator console on stdin (default)
    Run,

    /// Run a single poll cycle and exit
    Once,

    /// Validate the config file
    Validate,

    /// Show backlog per search stream
    Status,

    /// Render one listing as it would be posted
    Show {
        /// Listing id
        id: i64,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, cli.dry_run).await?,

        Command::Once => {
            let ctx = build_context(config, cli.dry_run).await?;
            ctx.platform.wait_until_ready().await?;
            let report = Poller::new(ctx).run_cycle().await;
            for outcome in &report.streams {
                log::info!(
                    "{}: fetched {}, posted {}, committed {}{}",
                    outcome.stream_id,
                    outcome.fetched,
                    outcome.delivered,
                    outcome.committed,
                    outcome
                        .error
                        .as_ref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                );
            }
        }

        Command::Validate => {
            for (name, value) in config.summary() {
                log::info!("{:>15}: {}", name, value);
            }
            log::info!("✓ Config OK");
        }

        Command::Status => {
            let store = open_store(&config).await?;
            for stream in &config.search {
                let waiting = store.count_unseen(&stream.search_indices).await?;
                println!("{}: {} new listing(s) waiting", stream, waiting);
            }
        }

        Command::Show { id } => {
            let ctx = build_context(config, true).await?;
            let record = ctx
                .store
                .get_listing(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("listing {}", id)))?;
            let thumbnail = ctx
                .config
                .search
                .iter()
                .find(|s| s.matches(record.search_url_id))
                .and_then(|s| s.thumbnail.as_deref());
            let payload = ctx.formatter.format_lenient(&record, thumbnail);
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}

async fn build_context(config: BotConfig, dry_run: bool) -> Result<BotContext> {
    let store = open_store(&config).await?;
    let platform = build_platform(&config, dry_run)?;
    Ok(BotContext::new(config, Arc::new(store), platform))
}

/// Poll loop plus console until ctrl-c, `shutdown`, or a fatal error.
async fn run(config: BotConfig, dry_run: bool) -> Result<()> {
    let ctx = build_context(config, dry_run).await?;
    let shutdown = ctx.shutdown.clone();

    let signal = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Interrupt received, stopping...");
            }
            shutdown.cancel();
        })
    };

    let console = tokio::spawn(run_console(ctx.clone()));
    let result = Poller::new(ctx).run().await;

    shutdown.cancel();
    signal.abort();
    match console.await {
        Ok(Err(e)) => log::warn!("Console stopped with an error: {}", e),
        Err(e) => log::warn!("Console task failed: {}", e),
        Ok(Ok(())) => {}
    }

    log::info!("Done!");
    result
}
