/// Average True Range (ATR) indicator
///
/// Measures volatility as the Wilder-smoothed average of true ranges.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Used for stop-loss sizing and as the band width of the trend band.

use crate::models::Candle;

/// True range for every candle after the first
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            (curr.high - curr.low)
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs())
        })
        .collect()
}

/// Calculate ATR for the given candles
///
/// Returns the current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    calculate_atr_series(candles, period).last().copied()
}

/// Wilder-smoothed ATR values
///
/// Element `k` belongs to candle index `period + k`.
pub fn calculate_atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period + 1 {
        return Vec::new();
    }

    let trs = true_ranges(candles);

    // First ATR is simple average of first 'period' true ranges
    let first_atr = trs.iter().take(period).sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(trs.len() - period + 1);
    series.push(first_atr);

    let mut atr = first_atr;
    for tr in &trs[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        series.push(atr);
    }

    series
}

/// ATR as a percentage of the last close
pub fn atr_percent(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = calculate_atr(candles, period)?;
    let close = candles.last()?.close;
    if close <= 0.0 {
        return None;
    }
    Some(atr / close * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(prices: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                timestamp: Utc::now() + chrono::Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_calculate_atr() {
        // Low volatility market
        let candles = create_test_candles(&[(100.0, 101.0, 99.0, 100.0); 15]);
        let atr = calculate_atr(&candles, 14);

        assert!(atr.is_some());
        // ATR should be around 2.0 (high-low range)
        assert!((atr.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_atr_high_volatility() {
        let high_vol_prices = vec![
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 110.0, 98.0, 105.0),
            (105.0, 108.0, 92.0, 95.0),
            (95.0, 103.0, 88.0, 100.0),
            (100.0, 115.0, 97.0, 110.0),
            (110.0, 112.0, 95.0, 98.0),
            (98.0, 108.0, 90.0, 105.0),
            (105.0, 120.0, 100.0, 115.0),
            (115.0, 118.0, 105.0, 110.0),
            (110.0, 125.0, 108.0, 120.0),
            (120.0, 130.0, 115.0, 125.0),
            (125.0, 128.0, 110.0, 115.0),
            (115.0, 122.0, 105.0, 118.0),
            (118.0, 130.0, 115.0, 125.0),
            (125.0, 135.0, 120.0, 130.0),
        ];

        let candles = create_test_candles(&high_vol_prices);
        let atr = calculate_atr(&candles, 14);

        assert!(atr.unwrap() > 10.0);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = create_test_candles(&[(100.0, 101.0, 99.0, 100.0); 2]);
        assert!(calculate_atr(&candles, 14).is_none());
        assert!(atr_percent(&candles, 14).is_none());
    }

    #[test]
    fn test_atr_series_alignment() {
        let candles = create_test_candles(&[(100.0, 105.0, 95.0, 100.0); 20]);
        let series = calculate_atr_series(&candles, 14);

        // 20 candles, 19 true ranges, first ATR at candle 14
        assert_eq!(series.len(), 6);
    }

    #[test]
    fn test_atr_percent() {
        let candles = create_test_candles(&[(50.0, 51.0, 49.0, 50.0); 15]);
        let pct = atr_percent(&candles, 14).unwrap();
        assert!((pct - 4.0).abs() < 1e-9);
    }
}
