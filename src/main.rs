use anyhow::Context;
use breakout_scanner::api::TelegramNotifier;
use breakout_scanner::engine::alerts;
use breakout_scanner::{ScannerConfig, ScannerEngine, Secrets};
use clap::Parser;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "breakout_scanner=info";

/// MEXC spot breakout scanner
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file (defaults to ./scanner.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single full iteration and exit
    #[arg(long)]
    once: bool,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Tracing filter, overrides RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.log_filter.as_deref());

    tracing::info!("🚀 Breakout scanner starting");

    let config = ScannerConfig::load(args.config.as_deref())?;
    let notifier = if args.dry_run {
        tracing::info!("🧪 Dry run: notifications are logged only");
        TelegramNotifier::disabled()
    } else {
        let secrets = Secrets::from_env();
        TelegramNotifier::new(secrets.telegram_token, secrets.chat_id)
    };
    if !notifier.is_enabled() && !args.dry_run {
        tracing::warn!("TELEGRAM_TOKEN / CHAT_ID not set, notifications will be logged");
    }

    let mut engine =
        ScannerEngine::new(&config, notifier).context("Failed to initialize scanner")?;

    log_configuration(&config);
    let min_score = if config.scorer.bronze_enabled {
        config.scorer.bronze_threshold
    } else {
        config.scorer.silver_threshold
    };
    engine
        .notifier()
        .send(&alerts::startup_banner(
            min_score,
            (config.positions.min_stop_pct, config.positions.max_stop_pct),
            config.engine.price_interval_secs,
            config.prefilter.max_candidates,
        ))
        .await;

    let result = if args.once {
        engine.iteration().await.map(|summary| {
            tracing::info!("✅ Single iteration complete: {:?}", summary);
        })
    } else {
        tokio::select! {
            _ = run_loop(&mut engine) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⛔ Shutdown requested");
            }
        }
        Ok(())
    };

    engine.notifier().send(&alerts::shutdown_banner()).await;
    result
}

async fn run_loop(engine: &mut ScannerEngine) {
    let pause = Duration::from_secs(engine.config().price_interval_secs);
    let backoff = Duration::from_secs(engine.config().error_backoff_secs);
    let mut cycle: u64 = 0;

    loop {
        cycle += 1;
        match engine.iteration().await {
            Ok(summary) => {
                tracing::info!(
                    cycle,
                    regime = ?summary.regime,
                    candidates = summary.candidates,
                    scanned = summary.scanned,
                    rejected = summary.rejected,
                    opened = summary.opened.len(),
                    open_positions = summary.open_positions,
                    hot_sectors = engine.hot_sectors().sectors.len(),
                    requests_last_minute = summary.requests_last_minute,
                    "🔁 Iteration complete"
                );
                tokio::time::sleep(pause).await;
            }
            Err(e) => {
                tracing::error!("❌ Iteration {} failed: {:#}", cycle, e);
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn setup_logging(cli_filter: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli_filter))
        .init();
}

/// `--log-filter` wins over RUST_LOG, which wins over the default
fn log_filter(cli_filter: Option<&str>) -> EnvFilter {
    match cli_filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

fn log_configuration(config: &ScannerConfig) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Exchange: {}", config.gateway.base_url);
    tracing::info!(
        "  Request budget: {}/min",
        config.gateway.requests_per_minute_budget
    );
    tracing::info!(
        "  Volume band: ${:.0} - ${:.0}",
        config.prefilter.min_quote_volume,
        config.prefilter.max_quote_volume
    );
    tracing::info!(
        "  Thresholds: gold {} / silver {} / bronze {}{}",
        config.scorer.gold_threshold,
        config.scorer.silver_threshold,
        config.scorer.bronze_threshold,
        if config.scorer.bronze_enabled { "" } else { " (disabled)" }
    );
    tracing::info!("  Sectors: {}", config.sector.sectors.len());
}
