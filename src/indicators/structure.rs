/// Price structure signals
///
/// Consolidation (tight range holding its level), higher lows, and the share of
/// green candles over a short window.

use crate::models::{Candle, SignalResult};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub window: usize,
    pub max_range_pct: f64,
    pub max_drop_pct: f64, // Last close vs first close of the window
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            window: 12,
            max_range_pct: 4.0,
            max_drop_pct: 2.0,
        }
    }
}

/// Lookback and minimum fraction for ratio-style structure checks
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatioConfig {
    pub lookback: usize,
    pub min_fraction: f64,
}

impl Default for RatioConfig {
    fn default() -> Self {
        Self {
            lookback: 8,
            min_fraction: 0.6,
        }
    }
}

/// Fraction of consecutive pairs whose lows did not decrease
fn higher_low_fraction(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }
    let rising = candles
        .windows(2)
        .filter(|pair| pair[1].low >= pair[0].low)
        .count();
    rising as f64 / (candles.len() - 1) as f64
}

pub fn consolidation(candles: &[Candle], config: &ConsolidationConfig) -> SignalResult {
    if config.window < 2 || candles.len() < config.window {
        return SignalResult::none();
    }

    let window = &candles[candles.len() - config.window..];
    let high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let first_close = window[0].close;
    if low <= 0.0 || first_close <= 0.0 {
        return SignalResult::none();
    }

    let range_pct = (high - low) / low * 100.0;
    let last_close = window[window.len() - 1].close;
    let drop_pct = (first_close - last_close) / first_close * 100.0;

    if range_pct > config.max_range_pct || drop_pct > config.max_drop_pct {
        return SignalResult::new(false, 0.0);
    }

    let tightness = (1.0 - range_pct / config.max_range_pct).max(0.0);
    let strength = tightness * 60.0 + higher_low_fraction(window) * 40.0;

    SignalResult::new(true, strength)
        .with_description(format!("consolidating in {:.1}% range", range_pct))
}

pub fn higher_lows(candles: &[Candle], config: &RatioConfig) -> SignalResult {
    if config.lookback < 2 || candles.len() < config.lookback {
        return SignalResult::none();
    }

    let fraction = higher_low_fraction(&candles[candles.len() - config.lookback..]);
    if fraction < config.min_fraction {
        return SignalResult::new(false, 0.0);
    }

    SignalResult::new(true, fraction * 100.0)
        .with_description(format!("{:.0}% higher lows", fraction * 100.0))
}

pub fn green_ratio(candles: &[Candle], config: &RatioConfig) -> SignalResult {
    if config.lookback == 0 || candles.len() < config.lookback {
        return SignalResult::none();
    }

    let recent = &candles[candles.len() - config.lookback..];
    let fraction = recent.iter().filter(|c| c.is_green()).count() as f64 / recent.len() as f64;
    if fraction < config.min_fraction {
        return SignalResult::new(false, 0.0);
    }

    SignalResult::new(true, fraction * 100.0)
        .with_description(format!("{:.0}% green candles", fraction * 100.0))
}
