/// Supertrend-style trend band
///
/// Bands sit `multiplier` ATRs around the candle midpoint. The lower band only
/// ratchets up while price holds above it, the upper band only ratchets down
/// while price stays below it, and direction flips when a close crosses the
/// active band.

use super::atr::calculate_atr_series;
use crate::models::Candle;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendBandConfig {
    pub period: usize,
    pub multiplier: f64,
    pub slope_lookback: usize, // Closes used when the band is inconclusive
}

impl Default for TrendBandConfig {
    fn default() -> Self {
        Self {
            period: 10,
            multiplier: 3.0,
            slope_lookback: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendDirection::Up => "UP",
            TrendDirection::Down => "DOWN",
            TrendDirection::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

pub fn trend_band_direction(candles: &[Candle], config: &TrendBandConfig) -> TrendDirection {
    let period = config.period.max(1);
    if candles.len() < period + 2 {
        return TrendDirection::Neutral;
    }

    let atr = calculate_atr_series(candles, period);
    if atr.is_empty() {
        return TrendDirection::Neutral;
    }

    let hl2 = |c: &Candle| (c.high + c.low) / 2.0;

    let start = period;
    let mut upper_band = hl2(&candles[start]) + config.multiplier * atr[0];
    let mut lower_band = hl2(&candles[start]) - config.multiplier * atr[0];
    let mut trending_up = true;

    for i in (start + 1)..candles.len() {
        let candle = &candles[i];
        let width = config.multiplier * atr[i - start];
        let basic_upper = hl2(candle) + width;
        let basic_lower = hl2(candle) - width;
        let prev_close = candles[i - 1].close;

        upper_band = if prev_close <= upper_band {
            basic_upper.min(upper_band)
        } else {
            basic_upper
        };
        lower_band = if prev_close >= lower_band {
            basic_lower.max(lower_band)
        } else {
            basic_lower
        };

        if trending_up && candle.close < lower_band {
            trending_up = false;
        } else if !trending_up && candle.close > upper_band {
            trending_up = true;
        }
    }

    let close = candles[candles.len() - 1].close;
    if trending_up && close > lower_band {
        return TrendDirection::Up;
    }
    if !trending_up && close < upper_band {
        return TrendDirection::Down;
    }

    slope_direction(candles, config.slope_lookback)
}

fn slope_direction(candles: &[Candle], lookback: usize) -> TrendDirection {
    let lookback = lookback.clamp(2, candles.len());
    let first = candles[candles.len() - lookback].close;
    let last = candles[candles.len() - 1].close;

    if last > first {
        TrendDirection::Up
    } else if last < first {
        TrendDirection::Down
    } else {
        TrendDirection::Neutral
    }
}
