/// Pre-breakout pattern on a long-horizon series
///
/// The window is split into an earlier flat segment and a later segment. The
/// pattern needs a tight flat range, a volume surge in the late segment, and
/// a price that has not yet run away from the base (the flat segment high).

use crate::models::{Candle, SignalResult};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreBreakoutConfig {
    pub candles: usize,
    pub flat_fraction: f64,
    pub max_flat_range_pct: f64,
    pub min_volume_surge: f64,
    pub max_above_base_pct: f64,
    pub extended_above_base_pct: f64, // Tolerated while the late pullback stays small
    pub max_pullback_pct: f64,
}

impl Default for PreBreakoutConfig {
    fn default() -> Self {
        Self {
            candles: 30,
            flat_fraction: 0.7,
            max_flat_range_pct: 12.0,
            min_volume_surge: 3.0,
            max_above_base_pct: 10.0,
            extended_above_base_pct: 15.0,
            max_pullback_pct: 3.0,
        }
    }
}

pub fn pre_breakout(candles: &[Candle], config: &PreBreakoutConfig) -> SignalResult {
    if config.candles < 4 || candles.len() < config.candles {
        return SignalResult::none();
    }

    let window = &candles[candles.len() - config.candles..];
    let split = ((window.len() as f64 * config.flat_fraction).round() as usize)
        .clamp(2, window.len() - 1);
    let (flat, late) = window.split_at(split);

    let flat_high = flat.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let flat_low = flat.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let flat_volume = flat.iter().map(|c| c.volume).sum::<f64>() / flat.len() as f64;
    let late_volume = late.iter().map(|c| c.volume).sum::<f64>() / late.len() as f64;
    let late_peak = late.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);

    if flat_low <= 0.0 || flat_volume <= 0.0 || late_peak <= 0.0 {
        return SignalResult::none();
    }

    let close = window[window.len() - 1].close;
    let flat_range_pct = (flat_high - flat_low) / flat_low * 100.0;
    let surge = late_volume / flat_volume;
    let above_base_pct = (close - flat_high) / flat_high * 100.0;
    let pullback_pct = (late_peak - close) / late_peak * 100.0;

    let near_base = above_base_pct <= config.max_above_base_pct
        || (above_base_pct <= config.extended_above_base_pct
            && pullback_pct <= config.max_pullback_pct);

    if flat_range_pct > config.max_flat_range_pct
        || surge < config.min_volume_surge
        || !near_base
    {
        return SignalResult::new(false, 0.0);
    }

    let tightness = (1.0 - flat_range_pct / config.max_flat_range_pct).max(0.0) * 35.0;
    let surge_score = (surge / config.min_volume_surge * 17.5).min(35.0);
    let closeness =
        (1.0 - above_base_pct.max(0.0) / config.extended_above_base_pct).max(0.0) * 30.0;

    SignalResult::new(true, tightness + surge_score + closeness).with_description(format!(
        "base {:.1}% wide, volume {:.1}x, {:+.1}% vs base high",
        flat_range_pct, surge, above_base_pct
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_h4_candles(data: &[(f64, f64)]) -> Vec<Candle> {
        data.iter()
            .enumerate()
            .map(|(i, &(close, volume))| Candle {
                timestamp: Utc::now() + chrono::Duration::hours(4 * i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume,
            })
            .collect()
    }

    fn base_then_surge(late_closes: &[f64]) -> Vec<Candle> {
        let mut data: Vec<(f64, f64)> = (0..21)
            .map(|i| (if i % 2 == 0 { 1.00 } else { 1.04 }, 1000.0))
            .collect();
        data.extend(late_closes.iter().map(|&c| (c, 4000.0)));
        create_h4_candles(&data)
    }

    #[test]
    fn test_pattern_near_base() {
        let candles = base_then_surge(&[1.04, 1.05, 1.06, 1.07, 1.08, 1.08, 1.09, 1.10, 1.10]);
        let result = pre_breakout(&candles, &PreBreakoutConfig::default());

        assert!(result.triggered);
        assert!(result.strength > 50.0);
    }

    #[test]
    fn test_extended_breakout_holding_level() {
        // ~13% above the base high, pullback from the late peak under 3%
        let candles = base_then_surge(&[1.10, 1.14, 1.17, 1.19, 1.20, 1.20, 1.19, 1.19, 1.19]);
        let result = pre_breakout(&candles, &PreBreakoutConfig::default());
        assert!(result.triggered);
    }

    #[test]
    fn test_extended_breakout_fading_is_rejected() {
        // ~12% above the base high but 11% off the late peak
        let candles = base_then_surge(&[1.10, 1.20, 1.28, 1.32, 1.30, 1.26, 1.22, 1.19, 1.18]);
        let result = pre_breakout(&candles, &PreBreakoutConfig::default());
        assert!(!result.triggered);
    }

    #[test]
    fn test_no_volume_surge() {
        let mut data: Vec<(f64, f64)> = (0..21).map(|_| (1.0, 1000.0)).collect();
        data.extend((0..9).map(|_| (1.02, 1500.0)));
        let result = pre_breakout(&create_h4_candles(&data), &PreBreakoutConfig::default());
        assert!(!result.triggered);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = create_h4_candles(&[(1.0, 1000.0); 12]);
        assert_eq!(pre_breakout(&candles, &PreBreakoutConfig::default()), SignalResult::none());
    }
}
