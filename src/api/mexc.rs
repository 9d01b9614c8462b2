use super::GatewayError;
use crate::models::{Candle, CandleSeries, OrderBookSummary, Resolution, TickerStats};
use chrono::DateTime;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const MEXC_API_BASE: &str = "https://api.mexc.com";

const TICKER_24H_PATH: &str = "/api/v3/ticker/24hr";
const TICKER_PRICE_PATH: &str = "/api/v3/ticker/price";
const KLINES_PATH: &str = "/api/v3/klines";
const DEPTH_PATH: &str = "/api/v3/depth";

const USER_AGENT: &str = "breakout-scanner/0.1";

/// Raw client for the MEXC spot REST API
///
/// One request per call, no retries and no caching. Payload fields may arrive
/// as JSON numbers or numeric strings; both are accepted.
#[derive(Clone)]
pub struct MexcClient {
    client: Client,
    base_url: String,
}

impl MexcClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status { endpoint, status });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// 24h statistics for every listed symbol
    pub async fn ticker_24h(&self) -> Result<Vec<TickerStats>, GatewayError> {
        let payload = self.get_json(TICKER_24H_PATH, &[]).await?;
        parse_tickers(&payload)
    }

    /// Latest trade price for every listed symbol
    pub async fn prices(&self) -> Result<HashMap<String, f64>, GatewayError> {
        let payload = self.get_json(TICKER_PRICE_PATH, &[]).await?;
        parse_prices(&payload)
    }

    pub async fn klines(
        &self,
        symbol: &str,
        resolution: Resolution,
        limit: usize,
    ) -> Result<CandleSeries, GatewayError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", resolution.as_interval().to_string()),
            ("limit", limit.to_string()),
        ];
        let payload = self.get_json(KLINES_PATH, &query).await?;
        parse_klines(&payload)
    }

    /// Top `limit` levels per side, summarised
    pub async fn depth(&self, symbol: &str, limit: usize) -> Result<OrderBookSummary, GatewayError> {
        let query = [("symbol", symbol.to_string()), ("limit", limit.to_string())];
        let payload = self.get_json(DEPTH_PATH, &query).await?;
        parse_depth(&payload)
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_f64(entry: &Value, key: &str) -> Option<f64> {
    entry.get(key).and_then(as_f64).filter(|v| v.is_finite())
}

/// Entries with a missing or non-numeric field are skipped, not fatal
pub fn parse_tickers(payload: &Value) -> Result<Vec<TickerStats>, GatewayError> {
    let entries = payload
        .as_array()
        .ok_or_else(|| GatewayError::malformed("ticker payload is not an array"))?;

    let mut tickers = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;

    for entry in entries {
        let symbol = entry.get("symbol").and_then(Value::as_str);
        let change = field_f64(entry, "priceChangePercent");
        let volume = field_f64(entry, "quoteVolume");

        match (symbol, change, volume) {
            (Some(symbol), Some(price_change_pct), Some(quote_volume)) => {
                tickers.push(TickerStats {
                    symbol: symbol.to_string(),
                    price_change_pct,
                    quote_volume,
                    last_price: field_f64(entry, "lastPrice").unwrap_or(0.0),
                });
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} malformed ticker entries", skipped);
    }

    Ok(tickers)
}

pub fn parse_prices(payload: &Value) -> Result<HashMap<String, f64>, GatewayError> {
    let entries = payload
        .as_array()
        .ok_or_else(|| GatewayError::malformed("price payload is not an array"))?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let symbol = entry.get("symbol")?.as_str()?;
            let price = field_f64(entry, "price")?;
            Some((symbol.to_string(), price))
        })
        .collect())
}

/// Any malformed row invalidates the whole series
pub fn parse_klines(payload: &Value) -> Result<CandleSeries, GatewayError> {
    let rows = payload
        .as_array()
        .ok_or_else(|| GatewayError::malformed("klines payload is not an array"))?;

    if rows.is_empty() {
        return Err(GatewayError::malformed("empty candle series"));
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let row = row
                .as_array()
                .filter(|r| r.len() >= 6)
                .ok_or_else(|| GatewayError::malformed(format!("kline row {} too short", i)))?;

            let open_time_ms = as_f64(&row[0])
                .ok_or_else(|| GatewayError::malformed(format!("kline row {} open time", i)))?;
            let timestamp = DateTime::from_timestamp_millis(open_time_ms as i64)
                .ok_or_else(|| GatewayError::malformed(format!("kline row {} timestamp", i)))?;

            let mut ohlcv = [0.0; 5];
            for (slot, value) in ohlcv.iter_mut().zip(&row[1..6]) {
                *slot = as_f64(value).filter(|v| v.is_finite()).ok_or_else(|| {
                    GatewayError::malformed(format!("kline row {} non-numeric field", i))
                })?;
            }

            Ok(Candle {
                timestamp,
                open: ohlcv[0],
                high: ohlcv[1],
                low: ohlcv[2],
                close: ohlcv[3],
                volume: ohlcv[4],
            })
        })
        .collect()
}

pub fn parse_depth(payload: &Value) -> Result<OrderBookSummary, GatewayError> {
    let bid_depth = side_depth(payload, "bids")?;
    let ask_depth = side_depth(payload, "asks")?;
    Ok(OrderBookSummary::from_depths(bid_depth, ask_depth))
}

fn side_depth(payload: &Value, side: &str) -> Result<f64, GatewayError> {
    let levels = match payload.get(side) {
        Some(Value::Array(levels)) => levels,
        Some(_) => return Err(GatewayError::malformed(format!("{} is not an array", side))),
        None => return Ok(0.0),
    };

    levels.iter().try_fold(0.0, |acc, level| {
        let price = level.get(0).and_then(as_f64);
        let size = level.get(1).and_then(as_f64);
        match (price, size) {
            (Some(price), Some(size)) => Ok(acc + price * size),
            _ => Err(GatewayError::malformed(format!("bad {} level", side))),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tickers_accepts_string_numbers() {
        let payload = json!([
            {"symbol": "FETUSDT", "priceChangePercent": "3.5", "quoteVolume": "4200000", "lastPrice": "1.2"},
            {"symbol": "ARBUSDT", "priceChangePercent": -1.25, "quoteVolume": 900000.0}
        ]);

        let tickers = parse_tickers(&payload).unwrap();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].price_change_pct, 3.5);
        assert_eq!(tickers[0].last_price, 1.2);
        assert_eq!(tickers[1].quote_volume, 900000.0);
        assert_eq!(tickers[1].last_price, 0.0);
    }

    #[test]
    fn test_parse_tickers_skips_malformed_entries() {
        let payload = json!([
            {"symbol": "FETUSDT", "priceChangePercent": "abc", "quoteVolume": "1"},
            {"priceChangePercent": "1.0", "quoteVolume": "1"},
            {"symbol": "OPUSDT", "priceChangePercent": "1.0", "quoteVolume": "2000000"}
        ]);

        let tickers = parse_tickers(&payload).unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].symbol, "OPUSDT");
    }

    #[test]
    fn test_parse_tickers_rejects_non_array() {
        let result = parse_tickers(&json!({"code": 700003}));
        assert!(matches!(result, Err(GatewayError::Malformed(_))));
    }

    #[test]
    fn test_parse_prices() {
        let payload = json!([
            {"symbol": "BTCUSDT", "price": "64000.5"},
            {"symbol": "BAD", "price": null}
        ]);
        let prices = parse_prices(&payload).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["BTCUSDT"], 64000.5);
    }

    #[test]
    fn test_parse_klines() {
        let payload = json!([
            [1700000000000i64, "1.0", "1.1", "0.9", "1.05", "1000", 1700000899999i64, "1050"],
            [1700000900000i64, "1.05", "1.2", "1.0", "1.15", "2500", 1700001799999i64, "2875"]
        ]);

        let candles = parse_klines(&payload).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 1.15);
        assert_eq!(candles[1].volume, 2500.0);
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[test]
    fn test_parse_klines_rejects_empty_and_short_rows() {
        assert!(parse_klines(&json!([])).is_err());
        assert!(parse_klines(&json!([[1700000000000i64, "1.0", "1.1"]])).is_err());
        assert!(parse_klines(&json!([[1700000000000i64, "1.0", "x", "0.9", "1.0", "5"]])).is_err());
    }

    #[test]
    fn test_parse_depth() {
        let payload = json!({
            "bids": [["10.0", "1000"], ["9.9", "500"]],
            "asks": [["10.1", "600"]]
        });

        let ob = parse_depth(&payload).unwrap();
        assert!((ob.bid_depth - 14950.0).abs() < 1e-6);
        assert!((ob.ask_depth - 6060.0).abs() < 1e-6);
        assert!((ob.imbalance - 14950.0 / 6060.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_depth_empty_asks_is_sentinel() {
        let payload = json!({"bids": [["1.0", "100"]], "asks": []});
        let ob = parse_depth(&payload).unwrap();
        assert_eq!(ob.imbalance, 99.0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/ticker/price")
            .with_status(503)
            .create_async()
            .await;

        let client = MexcClient::new(server.url(), Duration::from_secs(2)).unwrap();
        let result = client.prices().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(GatewayError::Status { .. })));
    }

    #[tokio::test]
    #[ignore] // Hits the live MEXC API
    async fn test_ticker_24h_live() {
        let client = MexcClient::new(MEXC_API_BASE, Duration::from_secs(10)).unwrap();
        let tickers = client.ticker_24h().await.unwrap();
        assert!(tickers.iter().any(|t| t.symbol == "BTCUSDT"));
    }
}
