/// Score Breakdown for One Symbol
///
/// Fetches the same data a deep scan would and prints every bucket of the
/// composite score, plus the stop loss the position manager would use.
///
/// Usage: cargo run --bin score_symbol -- FETUSDT [--regime cautious]

use breakout_scanner::execution::{MarketDataGateway, PositionManager};
use breakout_scanner::models::{Resolution, SignalResult};
use breakout_scanner::regime::RegimeState;
use breakout_scanner::strategy::{CompositeScorer, ScoreInput};
use breakout_scanner::{Result, ScannerConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RegimeArg {
    Permissive,
    Cautious,
    Restrictive,
}

impl From<RegimeArg> for RegimeState {
    fn from(arg: RegimeArg) -> Self {
        match arg {
            RegimeArg::Permissive => RegimeState::Permissive,
            RegimeArg::Cautious => RegimeState::Cautious,
            RegimeArg::Restrictive => RegimeState::Restrictive,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Print the composite score breakdown for one symbol")]
struct Args {
    /// Pair to score, e.g. FETUSDT
    symbol: String,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Regime to score under
    #[arg(long, value_enum, default_value = "permissive")]
    regime: RegimeArg,

    /// Apply the hot-sector bonus
    #[arg(long)]
    hot: bool,
}

fn describe(name: &str, signal: &SignalResult) {
    println!(
        "  {:<15} {} strength {:>5.1}  {}",
        name,
        if signal.triggered { "✅" } else { "  " },
        signal.strength,
        signal.description.as_deref().unwrap_or("")
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = ScannerConfig::load(args.config.as_deref())?;
    let symbol = args.symbol.to_uppercase();

    let mut gateway = MarketDataGateway::new(&config.gateway, config.cache.clone())?;
    let scorer = CompositeScorer::new(config.scorer.clone());
    let positions = PositionManager::new(config.positions.clone());

    println!("📊 {} breakout score\n", symbol);

    let candles = gateway
        .candles(&symbol, Resolution::M15, config.engine.primary_candles)
        .await
        .ok_or_else(|| format!("No {} candles for {}", Resolution::M15, symbol))?;
    let book = gateway.order_book(&symbol).await;
    let long_candles = gateway
        .candles(&symbol, Resolution::H4, config.engine.long_candles)
        .await;

    println!(
        "Candles: {} x {} | {} x {}",
        candles.len(),
        Resolution::M15,
        long_candles.as_ref().map_or(0, |c| c.len()),
        Resolution::H4
    );
    match &book {
        Some(b) => println!(
            "Order book: bids ${:.0} / asks ${:.0} (imbalance {:.2})\n",
            b.bid_depth, b.ask_depth, b.imbalance
        ),
        None => println!("Order book: unavailable\n"),
    }

    let input = ScoreInput {
        candles: &candles,
        order_book: book.as_ref(),
        long_candles: long_candles.as_deref(),
        regime: args.regime.into(),
        hot_sector: args.hot,
    };

    let card = match scorer.evaluate(&input) {
        Ok(card) => card,
        Err(rejection) => {
            println!("❌ Rejected: {}", rejection);
            return Ok(());
        }
    };

    let r = &card.readings;
    println!("Indicators (volume ratio {:.2}x, trend {}):", r.volume_ratio, r.trend);
    describe("volume spike", &r.spike);
    describe("accumulation", &r.accumulation);
    describe("consolidation", &r.consolidation);
    describe("higher lows", &r.higher_lows);
    describe("green ratio", &r.green);
    describe("pre-breakout", &r.pre_breakout);

    let b = &card.breakdown;
    println!("\nBuckets:");
    for (name, points) in [
        ("volume", b.volume),
        ("order book", b.order_book),
        ("spike", b.spike),
        ("accumulation", b.accumulation),
        ("consolidation", b.consolidation),
        ("higher lows", b.higher_lows),
        ("green", b.green),
        ("trend", b.trend),
        ("pre-breakout", b.pre_breakout),
        ("hot sector", b.hot_sector),
    ] {
        println!("  {:<15} {:>+6.1}", name, points);
    }
    println!("  {:<15} {:>6.1}", "raw total", b.total());

    match card.label {
        Some(label) => {
            let stop = positions.stop_loss_pct(
                &candles,
                label,
                card.imbalance,
                card.pre_breakout_fired(),
            );
            println!(
                "\n{} {}/100 {} | stop loss -{:.2}%",
                label.emoji(),
                card.score,
                label,
                stop
            );
        }
        None => println!("\n⚪ {}/100 below threshold", card.score),
    }

    Ok(())
}
