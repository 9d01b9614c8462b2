use crate::models::{MarketSnapshot, TickerStats};
use crate::regime::{HotSectorSet, RegimeState};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrefilterConfig {
    pub quote_asset: String,
    pub min_quote_volume: f64, // Exclusive
    pub max_quote_volume: f64, // Exclusive
    pub max_abs_change_pct: f64,
    pub max_candidates: usize,
    pub excluded_bases: Vec<String>,
    pub stable_bases: Vec<String>,
    pub leveraged_suffixes: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            min_quote_volume: 800_000.0,
            max_quote_volume: 20_000_000.0,
            max_abs_change_pct: 8.0,
            max_candidates: 30,
            excluded_bases: strings(&[
                "BTC", "ETH", "BNB", "SOL", "XRP", "ADA", "DOGE", "TRX", "TON", "AVAX", "DOT",
                "LINK", "LTC", "BCH", "MX",
            ]),
            stable_bases: strings(&["USDT", "BUSD", "USDC", "DAI", "TUSD", "PAX", "UST", "FDUSD"]),
            leveraged_suffixes: strings(&["3L", "3S", "5L", "5S", "BULL", "BEAR", "UP", "DOWN"]),
        }
    }
}

/// Reason a symbol was dropped before any deep fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    NotQuotePair,
    ExcludedMajor,
    StableAsset,
    LeveragedToken,
    AlreadyOpen,
    VolumeOutOfBand,
    ChangeOutOfBand,
    Underperforming,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Exclusion::NotQuotePair => "not a quote pair",
            Exclusion::ExcludedMajor => "excluded major",
            Exclusion::StableAsset => "stable asset",
            Exclusion::LeveragedToken => "leveraged token",
            Exclusion::AlreadyOpen => "already tracked",
            Exclusion::VolumeOutOfBand => "24h volume outside band",
            Exclusion::ChangeOutOfBand => "24h change outside band",
            Exclusion::Underperforming => "not outperforming reference",
        };
        f.write_str(s)
    }
}

/// Scanner state the filter depends on
pub struct PrefilterContext<'a> {
    pub regime: RegimeState,
    pub reference_change: Option<f64>,
    pub hot: &'a HotSectorSet,
    pub open_symbols: &'a HashSet<String>,
}

fn is_leveraged(base: &str, suffixes: &[String]) -> bool {
    // Needs a real underlying before the suffix (BTCUP, ETH3L) so JUP or OP3 survive
    suffixes
        .iter()
        .any(|s| base.strip_suffix(s.as_str()).is_some_and(|prefix| prefix.len() >= 2))
}

/// Check one ticker against every rule, in order
pub fn check_symbol(
    ticker: &TickerStats,
    config: &PrefilterConfig,
    ctx: &PrefilterContext<'_>,
) -> Result<(), Exclusion> {
    let Some(base) = ticker.symbol.strip_suffix(config.quote_asset.as_str()) else {
        return Err(Exclusion::NotQuotePair);
    };
    if base.is_empty() {
        return Err(Exclusion::NotQuotePair);
    }

    if config.excluded_bases.iter().any(|b| b == base) {
        return Err(Exclusion::ExcludedMajor);
    }
    if config.stable_bases.iter().any(|b| b == base) {
        return Err(Exclusion::StableAsset);
    }
    if is_leveraged(base, &config.leveraged_suffixes) {
        return Err(Exclusion::LeveragedToken);
    }
    if ctx.open_symbols.contains(&ticker.symbol) {
        return Err(Exclusion::AlreadyOpen);
    }

    if !ticker.quote_volume.is_finite()
        || ticker.quote_volume <= config.min_quote_volume
        || ticker.quote_volume >= config.max_quote_volume
    {
        return Err(Exclusion::VolumeOutOfBand);
    }
    if !ticker.price_change_pct.is_finite()
        || ticker.price_change_pct.abs() > config.max_abs_change_pct
    {
        return Err(Exclusion::ChangeOutOfBand);
    }

    if ctx.regime == RegimeState::Restrictive && !ctx.hot.contains_symbol(&ticker.symbol) {
        if let Some(reference) = ctx.reference_change {
            if ticker.price_change_pct <= reference {
                return Err(Exclusion::Underperforming);
            }
        }
    }

    Ok(())
}

/// Candidate symbols for the next deep scan
///
/// Ranked by 24h volume and capped; hot-sector members cut by the cap are
/// appended after the ranked list.
pub fn select_candidates(
    snapshot: &MarketSnapshot,
    config: &PrefilterConfig,
    ctx: &PrefilterContext<'_>,
) -> Vec<String> {
    let mut survivors: Vec<&TickerStats> = snapshot
        .tickers
        .values()
        .filter(|t| match check_symbol(t, config, ctx) {
            Ok(()) => true,
            Err(reason) => {
                tracing::trace!(symbol = %t.symbol, %reason, "Pre-filter excluded");
                false
            }
        })
        .collect();

    survivors.sort_by(|a, b| {
        b.quote_volume
            .total_cmp(&a.quote_volume)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let cut = survivors.len().min(config.max_candidates);
    let mut candidates: Vec<String> = survivors[..cut].iter().map(|t| t.symbol.clone()).collect();
    candidates.extend(
        survivors[cut..]
            .iter()
            .filter(|t| ctx.hot.contains_symbol(&t.symbol))
            .map(|t| t.symbol.clone()),
    );

    tracing::debug!(
        "Pre-filter kept {} of {} symbols ({} hot extras)",
        candidates.len(),
        snapshot.len(),
        candidates.len() - cut
    );

    candidates
}
