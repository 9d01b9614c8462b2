/// Volume-based signals: single-candle spikes and multi-candle accumulation

use crate::models::{Candle, SignalResult};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolumeSpikeConfig {
    pub lookback: usize, // Candles averaged before the last one
    pub ratio: f64,      // Multiple of the average that counts as a spike
    pub min_candles: usize,
}

impl Default for VolumeSpikeConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            ratio: 2.0,
            min_candles: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccumulationConfig {
    pub window: usize,
    pub baseline: usize,
    pub volume_multiple: f64,
    pub max_range_pct: f64,
    pub min_rising_fraction: f64,
}

impl Default for AccumulationConfig {
    fn default() -> Self {
        Self {
            window: 6,
            baseline: 12,
            volume_multiple: 1.5,
            max_range_pct: 3.0,
            min_rising_fraction: 0.5,
        }
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Last candle volume ÷ average of up to `lookback` preceding candles
///
/// None when there is no history or the average is zero.
pub fn volume_ratio(candles: &[Candle], lookback: usize) -> Option<f64> {
    if candles.len() < 2 || lookback == 0 {
        return None;
    }

    let last = candles.len() - 1;
    let start = last.saturating_sub(lookback);
    let avg = average(candles[start..last].iter().map(|c| c.volume))?;
    if avg <= 0.0 {
        return None;
    }

    Some(candles[last].volume / avg)
}

pub fn volume_spike(candles: &[Candle], config: &VolumeSpikeConfig) -> SignalResult {
    if candles.len() < config.min_candles.max(2) || config.ratio <= 0.0 {
        return SignalResult::none();
    }

    let Some(ratio) = volume_ratio(candles, config.lookback) else {
        return SignalResult::none();
    };

    if ratio < config.ratio {
        return SignalResult::new(false, 0.0);
    }

    SignalResult::new(true, (ratio / config.ratio * 50.0).min(100.0))
        .with_description(format!("volume {:.1}x average", ratio))
}

/// Sustained volume build-up while price holds a tight range
pub fn volume_accumulation(candles: &[Candle], config: &AccumulationConfig) -> SignalResult {
    if config.window < 2 || candles.len() < config.window + config.baseline {
        return SignalResult::none();
    }

    let split = candles.len() - config.window;
    let window = &candles[split..];
    let baseline = &candles[split - config.baseline..split];

    let (Some(window_avg), Some(baseline_avg)) = (
        average(window.iter().map(|c| c.volume)),
        average(baseline.iter().map(|c| c.volume)),
    ) else {
        return SignalResult::none();
    };
    if baseline_avg <= 0.0 {
        return SignalResult::none();
    }

    let max_close = window.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
    let min_close = window.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);
    if min_close <= 0.0 {
        return SignalResult::none();
    }

    let excess = window_avg / baseline_avg;
    let range_pct = (max_close - min_close) / min_close * 100.0;
    let rising = window
        .windows(2)
        .filter(|pair| pair[1].volume >= pair[0].volume)
        .count() as f64
        / (window.len() - 1) as f64;

    let triggered = excess >= config.volume_multiple
        && range_pct <= config.max_range_pct
        && rising >= config.min_rising_fraction;

    if !triggered {
        return SignalResult::new(false, 0.0);
    }

    let excess_score = (excess / config.volume_multiple * 20.0).min(40.0);
    let stability_score = (1.0 - range_pct / config.max_range_pct).max(0.0) * 30.0;
    let consistency_score = rising * 30.0;

    SignalResult::new(true, excess_score + stability_score + consistency_score).with_description(
        format!(
            "accumulating {:.1}x baseline, range {:.1}%",
            excess, range_pct
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_volume_candles(data: &[(f64, f64)]) -> Vec<Candle> {
        data.iter()
            .enumerate()
            .map(|(i, &(close, volume))| Candle {
                timestamp: Utc::now() + chrono::Duration::minutes(15 * i as i64),
                open: close,
                high: close * 1.001,
                low: close * 0.999,
                close,
                volume,
            })
            .collect()
    }

    #[test]
    fn test_volume_spike_detected() {
        let mut data = vec![(1.0, 1000.0); 20];
        data.push((1.02, 3200.0));
        let candles = create_volume_candles(&data);

        let result = volume_spike(&candles, &VolumeSpikeConfig::default());
        assert!(result.triggered);
        assert!((result.strength - 80.0).abs() < 1e-9); // 3.2 / 2.0 × 50
    }

    #[test]
    fn test_volume_spike_strength_capped() {
        let mut data = vec![(1.0, 100.0); 10];
        data.push((1.0, 10_000.0));
        let candles = create_volume_candles(&data);

        let result = volume_spike(&candles, &VolumeSpikeConfig::default());
        assert_eq!(result.strength, 100.0);
    }

    #[test]
    fn test_volume_spike_below_threshold() {
        let mut data = vec![(1.0, 1000.0); 10];
        data.push((1.0, 1500.0));
        let candles = create_volume_candles(&data);

        let result = volume_spike(&candles, &VolumeSpikeConfig::default());
        assert!(!result.triggered);
    }

    #[test]
    fn test_volume_spike_insufficient_data() {
        let candles = create_volume_candles(&[(1.0, 100.0), (1.0, 900.0)]);
        assert_eq!(volume_spike(&candles, &VolumeSpikeConfig::default()), SignalResult::none());
    }

    #[test]
    fn test_zero_baseline_volume_is_none() {
        let mut data = vec![(1.0, 0.0); 10];
        data.push((1.0, 500.0));
        let candles = create_volume_candles(&data);

        assert!(volume_ratio(&candles, 20).is_none());
        assert!(!volume_spike(&candles, &VolumeSpikeConfig::default()).triggered);
    }

    #[test]
    fn test_accumulation_detected() {
        let mut data = vec![(1.0, 1000.0); 12];
        for (i, vol) in [1500.0, 1600.0, 1600.0, 1800.0, 1750.0, 2000.0].iter().enumerate() {
            data.push((1.0 + i as f64 * 0.002, *vol));
        }
        let candles = create_volume_candles(&data);

        let result = volume_accumulation(&candles, &AccumulationConfig::default());
        assert!(result.triggered);
        assert!(result.strength > 50.0 && result.strength <= 100.0);
    }

    #[test]
    fn test_accumulation_rejects_wide_range() {
        let mut data = vec![(1.0, 1000.0); 12];
        for (i, vol) in [1500.0, 1600.0, 1700.0, 1800.0, 1900.0, 2000.0].iter().enumerate() {
            data.push((1.0 + i as f64 * 0.02, *vol));
        }
        let candles = create_volume_candles(&data);

        let result = volume_accumulation(&candles, &AccumulationConfig::default());
        assert!(!result.triggered);
    }

    #[test]
    fn test_accumulation_insufficient_data() {
        let candles = create_volume_candles(&[(1.0, 1000.0); 10]);
        assert_eq!(
            volume_accumulation(&candles, &AccumulationConfig::default()),
            SignalResult::none()
        );
    }
}
