use super::candle_cache::{CacheConfig, CandleCache};
use crate::api::{GatewayError, MexcClient, MEXC_API_BASE};
use crate::models::{CandleSeries, MarketSnapshot, OrderBookSummary, Resolution};
use chrono::{DateTime, Duration, Utc};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;

type BudgetLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub requests_per_minute_budget: u32,
    pub depth_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: MEXC_API_BASE.to_string(),
            timeout_secs: 10,
            requests_per_minute_budget: 600,
            depth_limit: 20,
        }
    }
}

/// Rolling count of requests issued in the last minute
#[derive(Debug, Default)]
pub struct RequestMeter {
    issued: VecDeque<DateTime<Utc>>,
}

impl RequestMeter {
    pub fn record_at(&mut self, now: DateTime<Utc>) {
        self.issued.push_back(now);
        self.prune(now);
    }

    pub fn count_at(&mut self, now: DateTime<Utc>) -> usize {
        self.prune(now);
        self.issued.len()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let window = Duration::seconds(60);
        while let Some(&oldest) = self.issued.front() {
            if now - oldest >= window {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Market data access for the scanner
///
/// Candle series go through the cache. Every outbound request is metered; the
/// budget is advisory and never blocks. Failures are logged and surface as
/// `None`.
pub struct MarketDataGateway {
    client: MexcClient,
    cache: CandleCache,
    meter: RequestMeter,
    budget: BudgetLimiter,
    depth_limit: usize,
}

impl MarketDataGateway {
    pub fn new(config: &GatewayConfig, cache_config: CacheConfig) -> Result<Self, GatewayError> {
        let client = MexcClient::new(
            config.base_url.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
        )?;

        let per_minute =
            NonZeroU32::new(config.requests_per_minute_budget).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            cache: CandleCache::new(cache_config),
            meter: RequestMeter::default(),
            budget: RateLimiter::direct(Quota::per_minute(per_minute)),
            depth_limit: config.depth_limit,
        })
    }

    fn record_request(&mut self, now: DateTime<Utc>) {
        self.meter.record_at(now);
        if self.budget.check().is_err() {
            tracing::warn!(
                "⚠️  Request budget exceeded ({} requests in the last minute)",
                self.meter.count_at(now)
            );
        }
    }

    pub async fn ticker_snapshot(&mut self) -> Option<MarketSnapshot> {
        self.ticker_snapshot_at(Utc::now()).await
    }

    pub async fn ticker_snapshot_at(&mut self, now: DateTime<Utc>) -> Option<MarketSnapshot> {
        self.record_request(now);
        match self.client.ticker_24h().await {
            Ok(tickers) => Some(MarketSnapshot::new(tickers, now)),
            Err(e) => {
                tracing::debug!(error = %e, "Ticker snapshot unavailable");
                None
            }
        }
    }

    pub async fn prices(&mut self) -> Option<HashMap<String, f64>> {
        self.prices_at(Utc::now()).await
    }

    pub async fn prices_at(&mut self, now: DateTime<Utc>) -> Option<HashMap<String, f64>> {
        self.record_request(now);
        match self.client.prices().await {
            Ok(prices) => Some(prices),
            Err(e) => {
                tracing::debug!(error = %e, "Price snapshot unavailable");
                None
            }
        }
    }

    pub async fn candles(
        &mut self,
        symbol: &str,
        resolution: Resolution,
        limit: usize,
    ) -> Option<CandleSeries> {
        self.candles_at(symbol, resolution, limit, Utc::now()).await
    }

    /// Cached series if fresh, otherwise fetched and cached
    pub async fn candles_at(
        &mut self,
        symbol: &str,
        resolution: Resolution,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Option<CandleSeries> {
        if let Some(series) = self.cache.get_at(symbol, resolution, limit, now) {
            return Some(series);
        }

        self.record_request(now);
        match self.client.klines(symbol, resolution, limit).await {
            Ok(series) => {
                self.cache
                    .insert_at(symbol, resolution, limit, series.clone(), now);
                Some(series)
            }
            Err(e) => {
                tracing::debug!(symbol, resolution = %resolution, error = %e, "Candle fetch failed");
                None
            }
        }
    }

    pub async fn order_book(&mut self, symbol: &str) -> Option<OrderBookSummary> {
        self.order_book_at(symbol, Utc::now()).await
    }

    pub async fn order_book_at(
        &mut self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Option<OrderBookSummary> {
        self.record_request(now);
        match self.client.depth(symbol, self.depth_limit).await {
            Ok(book) => Some(book),
            Err(e) => {
                tracing::debug!(symbol, error = %e, "Order book unavailable");
                None
            }
        }
    }

    pub fn requests_last_minute_at(&mut self, now: DateTime<Utc>) -> usize {
        self.meter.count_at(now)
    }

    pub fn compact_cache_at(&mut self, now: DateTime<Utc>) -> usize {
        self.cache.compact_at(now)
    }

    pub fn cache(&self) -> &CandleCache {
        &self.cache
    }
}
