/// Pump-and-dump detection
///
/// A triggered result is a hard veto: the symbol must not qualify no matter
/// how strong its other signals are.

use crate::models::{Candle, SignalResult};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PumpDumpConfig {
    pub lookback: usize,
    pub min_candles: usize,
    pub min_rise_pct: f64,       // Low-before-peak to peak
    pub min_drop_pct: f64,       // Peak to last close
    pub max_total_rise_pct: f64, // Window low to last close
}

impl Default for PumpDumpConfig {
    fn default() -> Self {
        Self {
            lookback: 24,
            min_candles: 6,
            min_rise_pct: 20.0,
            min_drop_pct: 5.0,
            max_total_rise_pct: 40.0,
        }
    }
}

pub fn pump_and_dump(candles: &[Candle], config: &PumpDumpConfig) -> SignalResult {
    if candles.len() < config.min_candles.max(2) {
        return SignalResult::none();
    }

    let window = &candles[candles.len().saturating_sub(config.lookback.max(2))..];

    let (peak_idx, peak) = window
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, c)| {
            if c.high > best {
                (i, c.high)
            } else {
                (best_i, best)
            }
        });

    let low_before_peak = window[..=peak_idx]
        .iter()
        .map(|c| c.low)
        .fold(f64::INFINITY, f64::min);
    let window_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);

    if low_before_peak <= 0.0 || window_low <= 0.0 || peak <= 0.0 {
        return SignalResult::none();
    }

    let last_close = window[window.len() - 1].close;
    let rise_pct = (peak - low_before_peak) / low_before_peak * 100.0;
    let drop_pct = (peak - last_close) / peak * 100.0;
    let total_rise_pct = (last_close - window_low) / window_low * 100.0;

    if rise_pct >= config.min_rise_pct && drop_pct >= config.min_drop_pct {
        return SignalResult::new(true, 100.0).with_description(format!(
            "pumped {:.1}% then dumped {:.1}% from peak",
            rise_pct, drop_pct
        ));
    }

    if total_rise_pct >= config.max_total_rise_pct {
        return SignalResult::new(true, 100.0)
            .with_description(format!("already up {:.1}% from window low", total_rise_pct));
    }

    SignalResult::new(false, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_close_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc::now() + chrono::Duration::minutes(15 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_rise_then_retrace_is_vetoed() {
        // +25% then -6% from the peak
        let closes = [100.0, 100.0, 105.0, 112.0, 118.0, 125.0, 121.0, 117.5];
        let result = pump_and_dump(&create_close_candles(&closes), &PumpDumpConfig::default());
        assert!(result.triggered);
    }

    #[test]
    fn test_runaway_rise_is_vetoed() {
        let closes = [100.0, 108.0, 116.0, 124.0, 132.0, 141.0];
        let result = pump_and_dump(&create_close_candles(&closes), &PumpDumpConfig::default());
        assert!(result.triggered);
    }

    #[test]
    fn test_steady_climb_passes() {
        let closes = [100.0, 101.0, 102.0, 103.5, 104.0, 105.0, 104.6, 106.0];
        let result = pump_and_dump(&create_close_candles(&closes), &PumpDumpConfig::default());
        assert!(!result.triggered);
    }

    #[test]
    fn test_dump_without_pump_passes() {
        let closes = [100.0, 99.0, 97.0, 94.0, 92.0, 91.0];
        let result = pump_and_dump(&create_close_candles(&closes), &PumpDumpConfig::default());
        assert!(!result.triggered);
    }

    #[test]
    fn test_insufficient_data() {
        let result = pump_and_dump(&create_close_candles(&[1.0, 2.0]), &PumpDumpConfig::default());
        assert_eq!(result, SignalResult::none());
    }
}
