use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// OHLCV candlestick for one time bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>, // Bucket open time
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64, // Base asset volume
}

impl Candle {
    /// Volume expressed in quote currency (approximated at the close)
    pub fn quote_volume(&self) -> f64 {
        self.volume * self.close
    }

    pub fn is_green(&self) -> bool {
        self.close >= self.open
    }
}

/// Ordered candles for one (symbol, resolution), oldest first
pub type CandleSeries = Vec<Candle>;

/// Candle resolution (bucket width)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    M15,
    H1,
    H4,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::M15, Resolution::H1, Resolution::H4];

    /// Interval string understood by the klines endpoint
    pub fn as_interval(&self) -> &'static str {
        match self {
            Resolution::M15 => "15m",
            Resolution::H1 => "60m",
            Resolution::H4 => "4h",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_interval())
    }
}

/// 24h statistics for one symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerStats {
    pub symbol: String,
    pub price_change_pct: f64,
    pub quote_volume: f64,
    pub last_price: f64,
}

/// Market-wide 24h snapshot, refreshed on its own cadence
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub tickers: HashMap<String, TickerStats>,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(tickers: Vec<TickerStats>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            tickers: tickers
                .into_iter()
                .map(|t| (t.symbol.clone(), t))
                .collect(),
            fetched_at,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&TickerStats> {
        self.tickers.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// Aggregated top-of-book depth for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSummary {
    pub bid_depth: f64, // Quote currency
    pub ask_depth: f64, // Quote currency
    pub imbalance: f64, // bid / ask, 99 when there are no asks
}

/// Imbalance reported when the ask side is empty
pub const IMBALANCE_NO_ASKS: f64 = 99.0;

impl OrderBookSummary {
    pub fn from_depths(bid_depth: f64, ask_depth: f64) -> Self {
        let imbalance = if ask_depth > 0.0 {
            bid_depth / ask_depth
        } else {
            IMBALANCE_NO_ASKS
        };

        Self {
            bid_depth,
            ask_depth,
            imbalance,
        }
    }
}

/// Outcome of a single indicator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResult {
    pub triggered: bool,
    pub strength: f64, // 0-100
    pub description: Option<String>,
}

impl SignalResult {
    /// Not triggered, zero strength (insufficient or degenerate data)
    pub fn none() -> Self {
        Self {
            triggered: false,
            strength: 0.0,
            description: None,
        }
    }

    pub fn new(triggered: bool, strength: f64) -> Self {
        Self {
            triggered,
            strength: strength.clamp(0.0, 100.0),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_book_imbalance() {
        let ob = OrderBookSummary::from_depths(160_000.0, 100_000.0);
        assert!((ob.imbalance - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_order_book_without_asks_is_sentinel() {
        let ob = OrderBookSummary::from_depths(50_000.0, 0.0);
        assert_eq!(ob.imbalance, IMBALANCE_NO_ASKS);
    }

    #[test]
    fn test_signal_strength_is_clamped() {
        assert_eq!(SignalResult::new(true, 250.0).strength, 100.0);
        assert_eq!(SignalResult::new(false, -3.0).strength, 0.0);
    }

    #[test]
    fn test_resolution_intervals() {
        assert_eq!(Resolution::M15.as_interval(), "15m");
        assert_eq!(Resolution::H1.as_interval(), "60m");
        assert_eq!(Resolution::H4.to_string(), "4h");
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = MarketSnapshot::new(
            vec![TickerStats {
                symbol: "FETUSDT".to_string(),
                price_change_pct: 3.2,
                quote_volume: 4_000_000.0,
                last_price: 1.25,
            }],
            Utc::now(),
        );

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("FETUSDT").unwrap().price_change_pct, 3.2);
        assert!(snapshot.get("BTCUSDT").is_none());
    }
}
