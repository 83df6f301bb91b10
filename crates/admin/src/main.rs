use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockwatch_core::config::Settings;
use stockwatch_core::storage::{StockStore, StorageOptions, TradingConfigStore};

#[derive(Debug, Parser)]
#[command(name = "stockwatch_admin")]
struct Args {
    /// Stock watchlist file. Defaults to STOCKS_FILE.
    #[arg(long, global = true)]
    stocks_file: Option<PathBuf>,

    /// Trading config file. Defaults to TRADING_CONFIGS_FILE.
    #[arg(long, global = true)]
    trading_configs_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load both state files and report their contents. Fails if either file is corrupt.
    Check,
    /// Insert the sample watchlist when the stock file holds no entries.
    Seed,
    /// Print watchlist entries as JSON.
    List {
        /// Only entries whose market matches exactly.
        #[arg(long)]
        market: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let mut stdout = std::io::stdout().lock();

    if let Err(err) = run(args, &settings, &mut stdout).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "admin command failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: Args, settings: &Settings, out: &mut impl Write) -> anyhow::Result<()> {
    let stocks_file = args.stocks_file.unwrap_or_else(|| settings.stocks_file.clone());
    let configs_file = args
        .trading_configs_file
        .unwrap_or_else(|| settings.trading_configs_file.clone());

    // Seeding is an explicit command here, never a side effect of opening.
    let options = StorageOptions {
        seed_on_empty: false,
        ..settings.storage_options()
    };

    match args.command {
        Command::Check => {
            let stocks = StockStore::open(&stocks_file, options)
                .await
                .with_context(|| format!("check failed for {}", stocks_file.display()))?;
            let configs = TradingConfigStore::open(&configs_file, options)
                .await
                .with_context(|| format!("check failed for {}", configs_file.display()))?;

            let entries = stocks.list().await;
            let mut markets: Vec<&str> = entries.iter().map(|e| e.market.as_str()).collect();
            markets.sort_unstable();
            markets.dedup();

            writeln!(
                out,
                "{}: {} entries, markets [{}]",
                stocks_file.display(),
                entries.len(),
                markets.join(", ")
            )?;
            writeln!(
                out,
                "{}: {} trading configs",
                configs_file.display(),
                configs.list().await.len()
            )?;
        }
        Command::Seed => {
            let stocks = StockStore::open(&stocks_file, options).await?;
            let added = stocks.seed_if_empty().await?;
            if added == 0 {
                writeln!(out, "{} already has entries; nothing seeded", stocks_file.display())?;
            } else {
                writeln!(out, "seeded {added} sample entries into {}", stocks_file.display())?;
            }
        }
        Command::List { market } => {
            let stocks = StockStore::open(&stocks_file, options).await?;
            let entries = stocks.list_filtered(market.as_deref()).await;
            serde_json::to_writer_pretty(&mut *out, &entries)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
