// Scan orchestration: one context owns all scanner state
pub mod alerts;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::TelegramNotifier;
use crate::config::ScannerConfig;
use crate::discovery::{select_candidates, PrefilterConfig, PrefilterContext};
use crate::execution::{MarketDataGateway, PositionEvent, PositionManager};
use crate::models::{MarketSnapshot, OrderBookSummary, Resolution};
use crate::regime::{HotSectorSet, MarketRegimeClassifier, RegimeState, SectorRotationTracker};
use crate::strategy::{CompositeScorer, ScoreInput};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub regime_interval_secs: i64,
    pub snapshot_interval_secs: i64,
    pub sector_interval_secs: i64,
    pub deep_scan_interval_secs: i64,
    pub report_interval_secs: i64,
    pub price_interval_secs: u64, // Sleep between iterations
    pub error_backoff_secs: u64,

    pub primary_candles: usize, // M15 candles per deep-scan fetch
    pub long_candles: usize,    // H4 candles for the pre-breakout pattern
    pub scan_pause_every: usize,
    pub scan_pause_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            regime_interval_secs: 300,
            snapshot_interval_secs: 600,
            sector_interval_secs: 900,
            deep_scan_interval_secs: 120,
            report_interval_secs: 6 * 3600,
            price_interval_secs: 10,
            error_backoff_secs: 5,

            primary_candles: 96,
            long_candles: 30,
            scan_pause_every: 5,
            scan_pause_ms: 500,
        }
    }
}

/// Fixed-interval schedule; due immediately until first marked
#[derive(Debug, Clone)]
struct Cadence {
    interval: Duration,
    last: Option<DateTime<Utc>>,
}

impl Cadence {
    fn every(secs: i64) -> Self {
        Self {
            interval: Duration::seconds(secs),
            last: None,
        }
    }

    fn due(&self, now: DateTime<Utc>) -> bool {
        self.last.map_or(true, |last| now - last >= self.interval)
    }

    fn mark(&mut self, now: DateTime<Utc>) {
        self.last = Some(now);
    }
}

struct Cadences {
    regime: Cadence,
    snapshot: Cadence,
    sector: Cadence,
    deep_scan: Cadence,
    report: Cadence,
}

/// What one iteration did, for the status log line
#[derive(Debug, Clone, Default)]
pub struct IterationSummary {
    pub regime: Option<RegimeState>,
    pub candidates: usize,
    pub scanned: usize,
    pub rejected: usize,
    pub opened: Vec<String>,
    pub position_events: usize,
    pub stale_evicted: usize,
    pub open_positions: usize,
    pub requests_last_minute: usize,
}

/// The scanner's single state owner
///
/// Every component is a field; one iteration runs the due stages in order and
/// awaits each request in turn.
pub struct ScannerEngine {
    config: EngineConfig,
    gateway: MarketDataGateway,
    notifier: TelegramNotifier,
    regime: MarketRegimeClassifier,
    sectors: SectorRotationTracker,
    prefilter: PrefilterConfig,
    scorer: CompositeScorer,
    positions: PositionManager,
    snapshot: Option<MarketSnapshot>,
    candidates: Vec<String>,
    cadences: Cadences,
}

impl ScannerEngine {
    pub fn new(config: &ScannerConfig, notifier: TelegramNotifier) -> anyhow::Result<Self> {
        let gateway = MarketDataGateway::new(&config.gateway, config.cache.clone())
            .context("Failed to build market data client")?;
        let engine = &config.engine;

        Ok(Self {
            config: engine.clone(),
            gateway,
            notifier,
            regime: MarketRegimeClassifier::new(config.regime.clone()),
            sectors: SectorRotationTracker::new(config.sector.clone()),
            prefilter: config.prefilter.clone(),
            scorer: CompositeScorer::new(config.scorer.clone()),
            positions: PositionManager::new(config.positions.clone()),
            snapshot: None,
            candidates: Vec::new(),
            cadences: Cadences {
                regime: Cadence::every(engine.regime_interval_secs),
                snapshot: Cadence::every(engine.snapshot_interval_secs),
                sector: Cadence::every(engine.sector_interval_secs),
                deep_scan: Cadence::every(engine.deep_scan_interval_secs),
                report: Cadence::every(engine.report_interval_secs),
            },
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn notifier(&self) -> &TelegramNotifier {
        &self.notifier
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn regime(&self) -> RegimeState {
        self.regime.state()
    }

    pub fn hot_sectors(&self) -> &HotSectorSet {
        self.sectors.hot()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub async fn iteration(&mut self) -> anyhow::Result<IterationSummary> {
        self.iteration_at(Utc::now()).await
    }

    /// Run every stage that is due at `now`
    pub async fn iteration_at(&mut self, now: DateTime<Utc>) -> anyhow::Result<IterationSummary> {
        let mut summary = IterationSummary::default();

        let refreshed = self.refresh_snapshot(now).await?;
        let regime_changed = self.refresh_regime(now).await;
        let sectors_rotated = self.refresh_sectors(now).await;

        if refreshed || regime_changed || sectors_rotated {
            self.refresh_candidates();
        }
        summary.regime = Some(self.regime.state());
        summary.candidates = self.candidates.len();

        let mut prices = None;
        if !self.positions.open_symbols().is_empty() {
            prices = self.gateway.prices_at(now).await;
            if let Some(prices) = &prices {
                let events = self.positions.update_prices_at(prices, now);
                summary.position_events = events.len();
                for event in &events {
                    self.announce(event).await;
                }
            }
        }

        if self.cadences.deep_scan.due(now) {
            self.cadences.deep_scan.mark(now);
            self.deep_scan(now, &mut summary).await;
        }

        let stale = self.positions.cleanup_stale_at(now);
        summary.stale_evicted = stale.len();
        for event in &stale {
            self.announce(event).await;
        }
        let compacted = self.gateway.compact_cache_at(now);
        let pruned = self.positions.prune_discoveries_at(now);
        if compacted > 0 || pruned > 0 {
            tracing::debug!(compacted, pruned, "Housekeeping");
        }

        if self.cadences.report.due(now) {
            self.cadences.report.mark(now);
            if prices.is_none() {
                prices = self.gateway.prices_at(now).await;
            }
            match prices {
                Some(prices) => self.send_report(&prices, now).await,
                None => tracing::warn!("⚠️  Skipping performance report, prices unavailable"),
            }
        }

        summary.open_positions = self.positions.open_symbols().len();
        summary.requests_last_minute = self.gateway.requests_last_minute_at(now);
        Ok(summary)
    }

    /// Returns true when a new snapshot was stored
    async fn refresh_snapshot(&mut self, now: DateTime<Utc>) -> anyhow::Result<bool> {
        if self.snapshot.is_some() && !self.cadences.snapshot.due(now) {
            return Ok(false);
        }

        match self.gateway.ticker_snapshot_at(now).await {
            Some(snapshot) if !snapshot.is_empty() => {
                tracing::info!("🔍 Market snapshot: {} symbols", snapshot.len());
                self.snapshot = Some(snapshot);
                self.cadences.snapshot.mark(now);
                Ok(true)
            }
            _ if self.snapshot.is_some() => {
                tracing::warn!("⚠️  Snapshot refresh failed, keeping previous snapshot");
                Ok(false)
            }
            _ => anyhow::bail!("No market snapshot available"),
        }
    }

    /// Returns true on a regime transition
    async fn refresh_regime(&mut self, now: DateTime<Utc>) -> bool {
        if !self.cadences.regime.due(now) {
            return false;
        }
        self.cadences.regime.mark(now);

        let reference = self.regime.config().reference_symbol.clone();
        let change_24h = self
            .snapshot
            .as_ref()
            .and_then(|s| s.get(&reference))
            .map(|t| t.price_change_pct);
        let hourly = self
            .gateway
            .candles_at(
                &reference,
                Resolution::H1,
                self.regime.config().trend_candles,
                now,
            )
            .await;

        let Some(transition) = self.regime.refresh(change_24h, hourly.as_deref()) else {
            return false;
        };

        tracing::info!("🌡️  Regime {} → {}", transition.from, transition.to);
        let inputs = self.regime.last_inputs().map(|(c, t, _)| (c, t));
        self.notifier
            .send(&alerts::regime_change(&transition, inputs, &reference))
            .await;
        true
    }

    /// Returns true on a sector rotation
    async fn refresh_sectors(&mut self, now: DateTime<Utc>) -> bool {
        if !self.cadences.sector.due(now) {
            return false;
        }
        let Some(snapshot) = &self.snapshot else {
            return false;
        };
        self.cadences.sector.mark(now);

        match self.sectors.refresh(snapshot) {
            Some(event) => {
                self.notifier.send(&alerts::sector_rotation(&event)).await;
                true
            }
            None => false,
        }
    }

    fn refresh_candidates(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let reference = &self.regime.config().reference_symbol;
        let open_symbols = self.positions.open_symbols();
        let ctx = PrefilterContext {
            regime: self.regime.state(),
            reference_change: snapshot.get(reference).map(|t| t.price_change_pct),
            hot: self.sectors.hot(),
            open_symbols: &open_symbols,
        };

        self.candidates = select_candidates(snapshot, &self.prefilter, &ctx);
        tracing::info!(
            "🎯 {} candidates (regime {}, {} hot sectors)",
            self.candidates.len(),
            self.regime.state(),
            self.sectors.hot().sectors.len()
        );
    }

    async fn deep_scan(&mut self, now: DateTime<Utc>, summary: &mut IterationSummary) {
        let candidates = self.candidates.clone();
        let regime = self.regime.state();

        for (i, symbol) in candidates.iter().enumerate() {
            if i > 0
                && self.config.scan_pause_every > 0
                && self.config.scan_pause_ms > 0
                && i % self.config.scan_pause_every == 0
            {
                tokio::time::sleep(std::time::Duration::from_millis(self.config.scan_pause_ms))
                    .await;
            }

            // Positions may have opened earlier in this pass
            if self.positions.has_open_position(symbol) {
                continue;
            }

            let Some(candles) = self
                .gateway
                .candles_at(symbol, Resolution::M15, self.config.primary_candles, now)
                .await
            else {
                continue;
            };
            summary.scanned += 1;

            if let Err(rejection) = self.scorer.screen(&candles) {
                tracing::debug!(symbol = %symbol, reason = %rejection, "Rejected");
                summary.rejected += 1;
                continue;
            }

            let book = self.gateway.order_book_at(symbol, now).await;
            let long_candles = self
                .gateway
                .candles_at(symbol, Resolution::H4, self.config.long_candles, now)
                .await;

            let input = ScoreInput {
                candles: &candles,
                order_book: book.as_ref(),
                long_candles: long_candles.as_deref(),
                regime,
                hot_sector: self.sectors.is_hot_symbol(symbol),
            };
            let card = match self.scorer.evaluate(&input) {
                Ok(card) => card,
                Err(rejection) => {
                    tracing::debug!(symbol = %symbol, reason = %rejection, "Rejected");
                    summary.rejected += 1;
                    continue;
                }
            };

            let Some(label) = card.label else {
                tracing::debug!(symbol = %symbol, score = card.score, "Below threshold");
                continue;
            };
            let Some(price) = candles.last().map(|c| c.close) else {
                continue;
            };

            let stop_loss_pct = self.positions.stop_loss_pct(
                &candles,
                label,
                card.imbalance,
                card.pre_breakout_fired(),
            );

            match self.positions.open_position_at(
                symbol,
                price,
                card.score,
                label,
                stop_loss_pct,
                Some(now),
            ) {
                Ok(PositionEvent::Opened(position)) => {
                    tracing::info!(
                        id = %position.id,
                        symbol = %symbol,
                        score = card.score,
                        label = %label,
                        price,
                        stop_loss_pct,
                        "🟢 SIGNAL #1"
                    );
                    let book: Option<&OrderBookSummary> = book.as_ref();
                    self.notifier
                        .send(&alerts::signal_opened(&position, &card, book))
                        .await;
                    summary.opened.push(symbol.clone());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Could not open {}: {}", symbol, e),
            }
        }
    }

    async fn announce(&self, event: &PositionEvent) {
        match event {
            PositionEvent::Opened(_) => {}
            PositionEvent::LevelUp {
                position,
                price,
                gain_pct,
            } => {
                tracing::info!(
                    "{} SIGNAL #{} | {} | +{:.2}%",
                    if position.level >= 3 { "🔥" } else { "🔵" },
                    position.level,
                    position.symbol,
                    gain_pct
                );
                self.notifier
                    .send(&alerts::level_up(position, *price, *gain_pct))
                    .await;
            }
            PositionEvent::Closed {
                position,
                price,
                reason,
            } => {
                tracing::info!(
                    id = %position.id,
                    symbol = %position.symbol,
                    reason = ?reason,
                    price = ?price,
                    "🛑 Position closed"
                );
                if let Some(text) = alerts::closed(position, *price, *reason) {
                    self.notifier.send(&text).await;
                }
            }
        }
    }

    async fn send_report(&self, prices: &HashMap<String, f64>, now: DateTime<Utc>) {
        let rows = self.positions.performance_report(prices);
        match alerts::performance_report(&rows, now) {
            Some(text) => {
                self.notifier.send(&text).await;
                tracing::info!("📊 Performance report sent ({} rows)", rows.len());
            }
            None => tracing::info!("📊 Nothing to report yet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_due_immediately_then_on_interval() {
        let mut cadence = Cadence::every(300);
        let t0 = Utc::now();
        assert!(cadence.due(t0));

        cadence.mark(t0);
        assert!(!cadence.due(t0 + Duration::seconds(299)));
        assert!(cadence.due(t0 + Duration::seconds(300)));
    }

    #[tokio::test]
    async fn test_iteration_fails_without_any_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v3/ticker/24hr")
            .with_status(503)
            .create_async()
            .await;

        let mut config = ScannerConfig::default();
        config.gateway.base_url = server.url();
        let mut engine = ScannerEngine::new(&config, TelegramNotifier::disabled()).unwrap();

        let result = engine.iteration_at(Utc::now()).await;
        assert!(result.is_err());
        assert!(engine.candidates().is_empty());
    }

    fn ai_snapshot(changes: [f64; 3]) -> String {
        let tickers: Vec<serde_json::Value> = ["FETUSDT", "RENDERUSDT", "TAOUSDT"]
            .iter()
            .zip(changes)
            .map(|(symbol, change)| {
                serde_json::json!({
                    "symbol": symbol,
                    "priceChangePercent": change.to_string(),
                    "quoteVolume": "2000000",
                    "lastPrice": "1.0"
                })
            })
            .collect();
        serde_json::Value::Array(tickers).to_string()
    }

    #[tokio::test]
    async fn test_sector_entry_and_exit_are_both_announced() {
        let mut server = mockito::Server::new_async().await;
        let rotation = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(mockito::Matcher::Regex("SECTOR".into()))
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .expect(2)
            .create_async()
            .await;
        let hot = server
            .mock("GET", "/api/v3/ticker/24hr")
            .with_status(200)
            .with_body(ai_snapshot([6.0, 4.0, 9.0]))
            .create_async()
            .await;

        let mut config = ScannerConfig::default();
        config.gateway.base_url = server.url();
        config.engine.scan_pause_ms = 0;
        let notifier = TelegramNotifier::new(Some("TOKEN".into()), Some("42".into()))
            .with_api_base(server.url());
        let mut engine = ScannerEngine::new(&config, notifier).unwrap();

        let t0 = Utc::now();
        engine.iteration_at(t0).await.unwrap();
        assert!(engine.hot_sectors().sectors.contains("AI"));

        hot.remove_async().await;
        let _cold = server
            .mock("GET", "/api/v3/ticker/24hr")
            .with_status(200)
            .with_body(ai_snapshot([-1.0, 0.5, -2.0]))
            .create_async()
            .await;

        engine
            .iteration_at(t0 + Duration::seconds(901))
            .await
            .unwrap();
        assert!(engine.hot_sectors().is_empty());

        rotation.assert_async().await;
    }
}
