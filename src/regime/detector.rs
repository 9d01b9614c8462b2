/// Market regime classifier
///
/// Reads the reference asset (BTC) to decide how permissive the scanner
/// should be:
/// - Restrictive: deep 24h drop or a steep hourly sell-off
/// - Cautious: shallow 24h drop or trend band pointing down
/// - Permissive: everything else

use crate::indicators::{trend_band_direction, TrendBandConfig, TrendDirection};
use crate::models::Candle;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegimeState {
    Permissive,
    Cautious,
    Restrictive,
}

impl fmt::Display for RegimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegimeState::Permissive => "PERMISSIVE",
            RegimeState::Cautious => "CAUTIOUS",
            RegimeState::Restrictive => "RESTRICTIVE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub reference_symbol: String,
    pub restrictive_change_24h_pct: f64,
    pub restrictive_trend_pct: f64, // Last H1 close vs the one before
    pub cautious_change_24h_pct: f64,
    pub trend_candles: usize, // H1 candles fetched for the trend band
    pub trend_band: TrendBandConfig,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            reference_symbol: "BTCUSDT".to_string(),
            restrictive_change_24h_pct: -5.0,
            restrictive_trend_pct: -2.0,
            cautious_change_24h_pct: -2.0,
            trend_candles: 30,
            trend_band: TrendBandConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegimeTransition {
    pub from: RegimeState,
    pub to: RegimeState,
}

/// Percent change between the last two closes
pub fn short_trend_pct(candles: &[Candle]) -> Option<f64> {
    let [.., prev, last] = candles else {
        return None;
    };
    if prev.close <= 0.0 {
        return None;
    }
    Some((last.close - prev.close) / prev.close * 100.0)
}

/// Classification rule, evaluated in order
pub fn classify(
    change_24h: f64,
    short_trend: f64,
    band: TrendDirection,
    config: &RegimeConfig,
) -> RegimeState {
    if change_24h <= config.restrictive_change_24h_pct || short_trend <= config.restrictive_trend_pct
    {
        RegimeState::Restrictive
    } else if change_24h <= config.cautious_change_24h_pct || band == TrendDirection::Down {
        RegimeState::Cautious
    } else {
        RegimeState::Permissive
    }
}

/// Holds the current regime between refreshes
///
/// Starts permissive. Only a change of state is reported.
pub struct MarketRegimeClassifier {
    config: RegimeConfig,
    state: RegimeState,
    last_inputs: Option<(f64, f64, TrendDirection)>,
}

impl MarketRegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            config,
            state: RegimeState::Permissive,
            last_inputs: None,
        }
    }

    pub fn state(&self) -> RegimeState {
        self.state
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// (24h change, short trend, band direction) from the last successful refresh
    pub fn last_inputs(&self) -> Option<(f64, f64, TrendDirection)> {
        self.last_inputs
    }

    /// Re-classify from the reference asset's 24h change and H1 series
    ///
    /// Missing inputs keep the previous state.
    pub fn refresh(
        &mut self,
        change_24h: Option<f64>,
        hourly: Option<&[Candle]>,
    ) -> Option<RegimeTransition> {
        let (Some(change_24h), Some(hourly)) = (change_24h, hourly) else {
            tracing::debug!("Regime inputs unavailable, keeping {}", self.state);
            return None;
        };
        let Some(short_trend) = short_trend_pct(hourly) else {
            tracing::debug!("Reference series too short, keeping {}", self.state);
            return None;
        };

        let band = trend_band_direction(hourly, &self.config.trend_band);
        let next = classify(change_24h, short_trend, band, &self.config);
        self.last_inputs = Some((change_24h, short_trend, band));

        tracing::debug!(
            change_24h,
            short_trend,
            band = %band,
            regime = %next,
            "Regime refreshed"
        );

        if next == self.state {
            return None;
        }

        let transition = RegimeTransition {
            from: self.state,
            to: next,
        };
        self.state = next;
        Some(transition)
    }
}
