use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::indicators::atr_percent;
use crate::models::Candle;
use crate::strategy::ScoreLabel;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub level2_gain_pct: f64,
    pub level3_gain_pct: f64,
    pub alert_cooldown_secs: i64,
    pub trailing_trigger_pct: f64, // Gain that arms the trailing stop
    pub trailing_drop_pct: f64,    // Retrace from peak that closes an armed position
    pub stale_after_secs: i64,

    // Stop-loss sizing
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub gold_multiplier: f64,
    pub silver_multiplier: f64,
    pub bronze_multiplier: f64,
    pub strong_imbalance: f64,
    pub strong_imbalance_multiplier: f64,
    pub breakout_multiplier: f64,
    pub min_stop_pct: f64,
    pub max_stop_pct: f64,
    pub default_stop_pct: f64,

    pub discovery_retention_hours: i64,
    pub report_min_growth_pct: f64,
    pub report_top: usize,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            level2_gain_pct: 2.0,
            level3_gain_pct: 4.0,
            alert_cooldown_secs: 300,
            trailing_trigger_pct: 2.0,
            trailing_drop_pct: 1.5,
            stale_after_secs: 7200,

            atr_period: 14,
            atr_multiplier: 2.0,
            gold_multiplier: 1.2,
            silver_multiplier: 1.0,
            bronze_multiplier: 0.9,
            strong_imbalance: 2.0,
            strong_imbalance_multiplier: 0.9,
            breakout_multiplier: 1.15,
            min_stop_pct: 2.0,
            max_stop_pct: 6.0,
            default_stop_pct: 4.0,

            discovery_retention_hours: 48,
            report_min_growth_pct: 5.0,
            report_top: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    Stale,
}

/// An emitted alert being followed
#[derive(Debug, Clone)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub entry_price: f64,
    pub peak_price: f64, // Running maximum since entry
    pub level: u8,       // Confirmation level 1-3
    pub score: u32,
    pub label: ScoreLabel,
    pub stop_loss_pct: f64,
    pub trailing_armed: bool,
    pub entry_time: DateTime<Utc>,
    pub last_alert: DateTime<Utc>,
}

impl Position {
    pub fn gain_pct(&self, price: f64) -> f64 {
        (price - self.entry_price) * 100.0 / self.entry_price
    }
}

/// Kept after the position closes, for the performance report
#[derive(Debug, Clone)]
pub struct DiscoveryRecord {
    pub symbol: String,
    pub price: f64,
    pub time: DateTime<Utc>,
    pub score: u32,
}

#[derive(Debug, Clone)]
pub enum PositionEvent {
    Opened(Position),
    LevelUp {
        position: Position,
        price: f64,
        gain_pct: f64,
    },
    Closed {
        position: Position,
        price: Option<f64>, // None for stale evictions
        reason: ExitReason,
    },
}

impl PositionEvent {
    pub fn symbol(&self) -> &str {
        match self {
            PositionEvent::Opened(position)
            | PositionEvent::LevelUp { position, .. }
            | PositionEvent::Closed { position, .. } => &position.symbol,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRow {
    pub symbol: String,
    pub discovery_price: f64,
    pub current_price: f64,
    pub growth_pct: f64,
    pub score: u32,
}

/// Owns every open position and the discovery history
pub struct PositionManager {
    positions: HashMap<String, Position>,
    discoveries: HashMap<String, DiscoveryRecord>,
    config: PositionConfig,
}

impl PositionManager {
    pub fn new(config: PositionConfig) -> Self {
        Self {
            positions: HashMap::new(),
            discoveries: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &PositionConfig {
        &self.config
    }

    /// Stop-loss % from ATR, scaled by tier, book pressure and breakout status
    pub fn stop_loss_pct(
        &self,
        candles: &[Candle],
        label: ScoreLabel,
        imbalance: Option<f64>,
        pre_breakout: bool,
    ) -> f64 {
        let config = &self.config;
        let Some(atr_pct) = atr_percent(candles, config.atr_period) else {
            return config.default_stop_pct;
        };

        let tier = match label {
            ScoreLabel::Gold => config.gold_multiplier,
            ScoreLabel::Silver => config.silver_multiplier,
            ScoreLabel::Bronze => config.bronze_multiplier,
        };
        let pressure = match imbalance {
            Some(i) if i >= config.strong_imbalance => config.strong_imbalance_multiplier,
            _ => 1.0,
        };
        let breakout = if pre_breakout {
            config.breakout_multiplier
        } else {
            1.0
        };

        (atr_pct * config.atr_multiplier * tier * pressure * breakout)
            .clamp(config.min_stop_pct, config.max_stop_pct)
    }

    pub fn open_position(
        &mut self,
        symbol: &str,
        price: f64,
        score: u32,
        label: ScoreLabel,
        stop_loss_pct: f64,
    ) -> anyhow::Result<PositionEvent> {
        self.open_position_at(symbol, price, score, label, stop_loss_pct, None)
    }

    /// Open a level-1 position; also records the discovery
    ///
    /// # Arguments
    /// * `timestamp` - Optional timestamp for tests. If None, uses Utc::now()
    pub fn open_position_at(
        &mut self,
        symbol: &str,
        price: f64,
        score: u32,
        label: ScoreLabel,
        stop_loss_pct: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> anyhow::Result<PositionEvent> {
        if self.positions.contains_key(symbol) {
            anyhow::bail!("Already have open position for {}", symbol);
        }
        if !(price.is_finite() && price > 0.0) {
            anyhow::bail!("Invalid entry price {} for {}", price, symbol);
        }

        let now = timestamp.unwrap_or_else(Utc::now);
        let position = Position {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            entry_price: price,
            peak_price: price,
            level: 1,
            score,
            label,
            stop_loss_pct,
            trailing_armed: false,
            entry_time: now,
            last_alert: now,
        };

        self.positions.insert(symbol.to_string(), position.clone());
        self.discoveries.insert(
            symbol.to_string(),
            DiscoveryRecord {
                symbol: symbol.to_string(),
                price,
                time: now,
                score,
            },
        );

        Ok(PositionEvent::Opened(position))
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get_open_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn open_symbols(&self) -> HashSet<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn discoveries(&self) -> impl Iterator<Item = &DiscoveryRecord> {
        self.discoveries.values()
    }

    /// Apply one observed price to an open position
    ///
    /// Exits are checked before confirmations. Once the trailing stop is
    /// armed it replaces the static stop loss.
    pub fn update_price_at(
        &mut self,
        symbol: &str,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<PositionEvent> {
        let config = &self.config;
        let position = self.positions.get_mut(symbol)?;
        if !(price.is_finite() && price > 0.0) {
            return None;
        }

        position.peak_price = position.peak_price.max(price);
        let gain = position.gain_pct(price);
        if gain >= config.trailing_trigger_pct {
            position.trailing_armed = true;
        }

        let exit = if position.trailing_armed {
            let drop_from_peak = (position.peak_price - price) * 100.0 / position.peak_price;
            (drop_from_peak >= config.trailing_drop_pct).then_some(ExitReason::TrailingStop)
        } else {
            (gain <= -position.stop_loss_pct).then_some(ExitReason::StopLoss)
        };

        if let Some(reason) = exit {
            let position = self.positions.remove(symbol)?;
            return Some(PositionEvent::Closed {
                position,
                price: Some(price),
                reason,
            });
        }

        let cooled_down =
            now - position.last_alert >= Duration::seconds(config.alert_cooldown_secs);
        let next_level = match position.level {
            1 if gain >= config.level2_gain_pct => Some(2),
            2 if gain >= config.level3_gain_pct => Some(3),
            _ => None,
        };

        match next_level {
            Some(level) if cooled_down => {
                position.level = level;
                position.last_alert = now;
                Some(PositionEvent::LevelUp {
                    position: position.clone(),
                    price,
                    gain_pct: gain,
                })
            }
            _ => None,
        }
    }

    /// Apply a bulk price snapshot to every open position
    pub fn update_prices_at(
        &mut self,
        prices: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Vec<PositionEvent> {
        let mut symbols: Vec<String> = self.positions.keys().cloned().collect();
        symbols.sort();

        symbols
            .iter()
            .filter_map(|symbol| {
                let price = *prices.get(symbol)?;
                self.update_price_at(symbol, price, now)
            })
            .collect()
    }

    /// Evict positions with no alert inside the staleness window
    pub fn cleanup_stale_at(&mut self, now: DateTime<Utc>) -> Vec<PositionEvent> {
        let stale_after = Duration::seconds(self.config.stale_after_secs);
        let mut stale: Vec<String> = self
            .positions
            .values()
            .filter(|p| now - p.last_alert > stale_after)
            .map(|p| p.symbol.clone())
            .collect();
        stale.sort();

        stale
            .into_iter()
            .filter_map(|symbol| self.positions.remove(&symbol))
            .map(|position| PositionEvent::Closed {
                position,
                price: None,
                reason: ExitReason::Stale,
            })
            .collect()
    }

    /// Drop discovery records past the retention window
    pub fn prune_discoveries_at(&mut self, now: DateTime<Utc>) -> usize {
        let retention = Duration::hours(self.config.discovery_retention_hours);
        let before = self.discoveries.len();
        self.discoveries.retain(|_, d| now - d.time <= retention);
        before - self.discoveries.len()
    }

    /// Discoveries that grew past the report threshold, best first
    pub fn performance_report(&self, prices: &HashMap<String, f64>) -> Vec<PerformanceRow> {
        let mut rows: Vec<PerformanceRow> = self
            .discoveries
            .values()
            .filter(|d| d.price > 0.0)
            .filter_map(|d| {
                let current = *prices.get(&d.symbol)?;
                let growth = (current - d.price) * 100.0 / d.price;
                (growth > self.config.report_min_growth_pct).then(|| PerformanceRow {
                    symbol: d.symbol.clone(),
                    discovery_price: d.price,
                    current_price: current,
                    growth_pct: growth,
                    score: d.score,
                })
            })
            .collect();

        rows.sort_by(|a, b| b.growth_pct.total_cmp(&a.growth_pct));
        rows.truncate(self.config.report_top);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_at(pm: &mut PositionManager, symbol: &str, price: f64, t: DateTime<Utc>) {
        pm.open_position_at(symbol, price, 85, ScoreLabel::Gold, 4.0, Some(t))
            .unwrap();
    }

    fn closed_reason(event: &Option<PositionEvent>) -> Option<ExitReason> {
        match event {
            Some(PositionEvent::Closed { reason, .. }) => Some(*reason),
            _ => None,
        }
    }

    #[test]
    fn test_open_position() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let event = pm
            .open_position("FETUSDT", 1.25, 88, ScoreLabel::Gold, 3.0)
            .unwrap();

        assert!(matches!(event, PositionEvent::Opened(_)));
        let position = pm.get_open_position("FETUSDT").unwrap();
        assert_eq!(position.level, 1);
        assert_eq!(position.peak_price, 1.25);
        assert_eq!(position.entry_time, position.last_alert);
        assert_eq!(pm.discoveries().count(), 1);
    }

    #[test]
    fn test_prevent_duplicate_positions() {
        let mut pm = PositionManager::new(PositionConfig::default());
        pm.open_position("FETUSDT", 1.0, 80, ScoreLabel::Gold, 4.0)
            .unwrap();

        let result = pm.open_position("FETUSDT", 1.1, 90, ScoreLabel::Gold, 4.0);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Already have open position"));
    }

    #[test]
    fn test_trailing_stop_closes_after_retrace_from_peak() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        open_at(&mut pm, "FETUSDT", 100.0, t0);

        assert!(pm.update_price_at("FETUSDT", 100.0, t0).is_none());
        assert!(pm.update_price_at("FETUSDT", 103.0, t0).is_none());
        assert!(pm.get_open_position("FETUSDT").unwrap().trailing_armed);
        assert!(pm.update_price_at("FETUSDT", 104.0, t0).is_none());

        // 104 × (1 − 0.015) = 102.46
        let event = pm.update_price_at("FETUSDT", 102.2, t0);
        assert_eq!(closed_reason(&event), Some(ExitReason::TrailingStop));
        assert!(!pm.has_open_position("FETUSDT"));
    }

    #[test]
    fn test_stop_loss() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        open_at(&mut pm, "FETUSDT", 100.0, t0);

        assert!(pm.update_price_at("FETUSDT", 100.0, t0).is_none());
        assert!(pm.update_price_at("FETUSDT", 97.0, t0).is_none());
        assert!(pm.has_open_position("FETUSDT"));

        let event = pm.update_price_at("FETUSDT", 95.9, t0);
        assert_eq!(closed_reason(&event), Some(ExitReason::StopLoss));
        match event {
            Some(PositionEvent::Closed { price, .. }) => assert_eq!(price, Some(95.9)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_armed_trailing_replaces_static_stop() {
        let config = PositionConfig {
            trailing_drop_pct: 10.0,
            ..PositionConfig::default()
        };
        let mut pm = PositionManager::new(config);
        let t0 = Utc::now();
        pm.open_position_at("FETUSDT", 100.0, 85, ScoreLabel::Gold, 2.0, Some(t0))
            .unwrap();

        pm.update_price_at("FETUSDT", 102.5, t0);
        // −3% from entry would hit the 2% static stop, but the 10% trail is in charge
        assert!(pm.update_price_at("FETUSDT", 97.0, t0).is_none());
        assert!(pm.has_open_position("FETUSDT"));
    }

    #[test]
    fn test_level_progression_with_cooldown() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        open_at(&mut pm, "FETUSDT", 100.0, t0);
        let t1 = t0 + Duration::seconds(301);

        assert!(pm.update_price_at("FETUSDT", 101.9, t1).is_none());
        assert_eq!(pm.get_open_position("FETUSDT").unwrap().level, 1);

        let event = pm.update_price_at("FETUSDT", 102.0, t1);
        assert!(matches!(event, Some(PositionEvent::LevelUp { .. })));
        assert_eq!(pm.get_open_position("FETUSDT").unwrap().level, 2);

        // Same price again: no repeat
        assert!(pm.update_price_at("FETUSDT", 102.0, t1).is_none());
        assert!(pm
            .update_price_at("FETUSDT", 102.0, t1 + Duration::seconds(60))
            .is_none());
        assert_eq!(pm.get_open_position("FETUSDT").unwrap().level, 2);
    }

    #[test]
    fn test_level_up_waits_for_cooldown() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        open_at(&mut pm, "FETUSDT", 100.0, t0);

        assert!(pm
            .update_price_at("FETUSDT", 102.5, t0 + Duration::seconds(120))
            .is_none());

        let event = pm.update_price_at("FETUSDT", 102.5, t0 + Duration::seconds(300));
        assert!(matches!(event, Some(PositionEvent::LevelUp { .. })));

        // Level 3 needs +4% and another cooldown
        let t2 = t0 + Duration::seconds(300 + 301);
        let event = pm.update_price_at("FETUSDT", 104.1, t2);
        match event {
            Some(PositionEvent::LevelUp { position, gain_pct, .. }) => {
                assert_eq!(position.level, 3);
                assert!(gain_pct >= 4.0);
            }
            other => panic!("expected level 3, got {:?}", other),
        }
    }

    #[test]
    fn test_update_prices_skips_missing_symbols() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        open_at(&mut pm, "FETUSDT", 100.0, t0);
        open_at(&mut pm, "ARBUSDT", 1.0, t0);

        let prices: HashMap<String, f64> = [("FETUSDT".to_string(), 95.0)].into_iter().collect();
        let events = pm.update_prices_at(&prices, t0);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol(), "FETUSDT");
        assert!(pm.has_open_position("ARBUSDT"));
    }

    #[test]
    fn test_stale_positions_evicted() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        open_at(&mut pm, "OLDUSDT", 1.0, t0 - Duration::hours(3));
        open_at(&mut pm, "NEWUSDT", 1.0, t0 - Duration::minutes(30));

        let events = pm.cleanup_stale_at(t0);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            PositionEvent::Closed { reason: ExitReason::Stale, price: None, .. }
        ));
        assert!(pm.has_open_position("NEWUSDT"));

        // Discovery survives the position
        assert!(pm.discoveries().any(|d| d.symbol == "OLDUSDT"));
    }

    #[test]
    fn test_stop_loss_sizing() {
        let pm = PositionManager::new(PositionConfig::default());
        let candles: Vec<Candle> = (0..20)
            .map(|i| Candle {
                timestamp: Utc::now() + Duration::minutes(15 * i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1000.0,
            })
            .collect();

        // ATR 2% × 2.0 × 1.2 = 4.8
        let gold = pm.stop_loss_pct(&candles, ScoreLabel::Gold, Some(1.5), false);
        assert!((gold - 4.8).abs() < 1e-9);

        // × 0.9 × 1.15
        let pressured = pm.stop_loss_pct(&candles, ScoreLabel::Gold, Some(2.5), true);
        assert!((pressured - 4.968).abs() < 1e-9);

        // Clamped to the band
        let bronze = pm.stop_loss_pct(&candles[..1], ScoreLabel::Bronze, None, false);
        assert_eq!(bronze, 4.0);
        let tight: Vec<Candle> = candles
            .iter()
            .map(|c| Candle { high: 100.1, low: 99.9, ..c.clone() })
            .collect();
        assert_eq!(pm.stop_loss_pct(&tight, ScoreLabel::Silver, None, false), 2.0);
    }

    #[test]
    fn test_performance_report() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        for (symbol, price) in [("AUSDT", 1.0), ("BUSDT", 2.0), ("CUSDT", 4.0)] {
            open_at(&mut pm, symbol, price, t0);
        }

        let prices: HashMap<String, f64> = [
            ("AUSDT".to_string(), 1.04), // +4%, below threshold
            ("BUSDT".to_string(), 2.3),  // +15%
            ("CUSDT".to_string(), 4.4),  // +10%
        ]
        .into_iter()
        .collect();

        let rows = pm.performance_report(&prices);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "BUSDT");
        assert_eq!(rows[1].symbol, "CUSDT");
    }

    #[test]
    fn test_discovery_retention() {
        let mut pm = PositionManager::new(PositionConfig::default());
        let t0 = Utc::now();
        open_at(&mut pm, "AUSDT", 1.0, t0 - Duration::hours(50));
        open_at(&mut pm, "BUSDT", 1.0, t0 - Duration::hours(1));

        assert_eq!(pm.prune_discoveries_at(t0), 1);
        assert_eq!(pm.discoveries().count(), 1);
    }
}
