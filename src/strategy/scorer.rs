use crate::indicators::{
    consolidation, green_ratio, higher_lows, pre_breakout, pump_and_dump, trend_band_direction,
    volume_accumulation, volume_ratio, volume_spike, AccumulationConfig, ConsolidationConfig,
    PreBreakoutConfig, PumpDumpConfig, RatioConfig, TrendBandConfig, TrendDirection,
    VolumeSpikeConfig,
};
use crate::models::{Candle, OrderBookSummary, SignalResult};
use crate::regime::RegimeState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weight and guaranteed minimum for a triggered indicator
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BucketWeight {
    pub weight: f64,
    pub floor: f64,
}

impl BucketWeight {
    const fn new(weight: f64, floor: f64) -> Self {
        Self { weight, floor }
    }

    fn contribution(&self, signal: &SignalResult) -> f64 {
        if !signal.triggered {
            return 0.0;
        }
        (self.weight * signal.strength / 100.0).max(self.floor)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub min_candles: usize,
    pub min_candle_quote_volume: f64,
    pub min_volume_ratio: f64,
    pub min_imbalance: f64,
    pub max_imbalance: f64,
    pub min_bid_depth: f64,
    pub strong_imbalance: f64,

    pub gold_threshold: u32,
    pub silver_threshold: u32,
    pub bronze_threshold: u32,
    pub bronze_enabled: bool,

    pub spike_weight: BucketWeight,
    pub accumulation_weight: BucketWeight,
    pub consolidation_weight: BucketWeight,
    pub higher_lows_weight: BucketWeight,
    pub green_weight: BucketWeight,
    pub pre_breakout_weight: BucketWeight,
    pub trend_bonus: f64,
    pub hot_sector_bonus: f64,

    pub spike: VolumeSpikeConfig,
    pub accumulation: AccumulationConfig,
    pub consolidation: ConsolidationConfig,
    pub higher_lows: RatioConfig,
    pub green: RatioConfig,
    pub trend_band: TrendBandConfig,
    pub pump_dump: PumpDumpConfig,
    pub pre_breakout: PreBreakoutConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            min_candles: 24,
            min_candle_quote_volume: 20_000.0,
            min_volume_ratio: 1.2,
            min_imbalance: 0.8,
            max_imbalance: 3.0,
            min_bid_depth: 50_000.0,
            strong_imbalance: 1.2,

            gold_threshold: 80,
            silver_threshold: 65,
            bronze_threshold: 55,
            bronze_enabled: true,

            spike_weight: BucketWeight::new(15.0, 8.0),
            accumulation_weight: BucketWeight::new(15.0, 6.0),
            consolidation_weight: BucketWeight::new(10.0, 5.0),
            higher_lows_weight: BucketWeight::new(10.0, 5.0),
            green_weight: BucketWeight::new(10.0, 5.0),
            pre_breakout_weight: BucketWeight::new(15.0, 8.0),
            trend_bonus: 10.0,
            hot_sector_bonus: 10.0,

            spike: VolumeSpikeConfig::default(),
            accumulation: AccumulationConfig::default(),
            consolidation: ConsolidationConfig::default(),
            higher_lows: RatioConfig::default(),
            green: RatioConfig::default(),
            trend_band: TrendBandConfig::default(),
            pump_dump: PumpDumpConfig::default(),
            pre_breakout: PreBreakoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ScoreLabel {
    Bronze,
    Silver,
    Gold,
}

impl ScoreLabel {
    pub fn emoji(&self) -> &'static str {
        match self {
            ScoreLabel::Gold => "🥇",
            ScoreLabel::Silver => "🥈",
            ScoreLabel::Bronze => "🥉",
        }
    }
}

impl fmt::Display for ScoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoreLabel::Gold => "GOLD",
            ScoreLabel::Silver => "SILVER",
            ScoreLabel::Bronze => "BRONZE",
        };
        f.write_str(s)
    }
}

/// Intentional exclusion, not a data error
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientCandles { have: usize, need: usize },
    PumpAndDump(String),
    LowVolume { quote_volume: f64, ratio: f64 },
    WeakCandles,
    ImbalanceOutOfBand(f64),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientCandles { have, need } => {
                write!(f, "insufficient candles ({}/{})", have, need)
            }
            Rejection::PumpAndDump(why) => write!(f, "pump and dump: {}", why),
            Rejection::LowVolume {
                quote_volume,
                ratio,
            } => write!(f, "low volume (${:.0}, {:.2}x)", quote_volume, ratio),
            Rejection::WeakCandles => f.write_str("not enough green candles"),
            Rejection::ImbalanceOutOfBand(imbalance) => {
                write!(f, "order book imbalance {:.2} outside band", imbalance)
            }
        }
    }
}

/// Indicator outputs behind a score
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorReadings {
    pub volume_ratio: f64,
    pub spike: SignalResult,
    pub accumulation: SignalResult,
    pub consolidation: SignalResult,
    pub higher_lows: SignalResult,
    pub green: SignalResult,
    pub trend: TrendDirection,
    pub pre_breakout: SignalResult,
}

/// Points per bucket, before rounding and clamping
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreBreakdown {
    pub volume: f64,
    pub order_book: f64,
    pub spike: f64,
    pub accumulation: f64,
    pub consolidation: f64,
    pub higher_lows: f64,
    pub green: f64,
    pub trend: f64,
    pub pre_breakout: f64,
    pub hot_sector: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.volume
            + self.order_book
            + self.spike
            + self.accumulation
            + self.consolidation
            + self.higher_lows
            + self.green
            + self.trend
            + self.pre_breakout
            + self.hot_sector
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreCard {
    pub score: u32, // 0-100
    pub label: Option<ScoreLabel>,
    pub breakdown: ScoreBreakdown,
    pub readings: IndicatorReadings,
    pub imbalance: Option<f64>,
}

impl ScoreCard {
    pub fn qualifies(&self) -> bool {
        self.label.is_some()
    }

    pub fn pre_breakout_fired(&self) -> bool {
        self.readings.pre_breakout.triggered
    }
}

/// Everything the scorer looks at for one candidate
pub struct ScoreInput<'a> {
    pub candles: &'a [Candle], // Primary resolution
    pub order_book: Option<&'a OrderBookSummary>,
    pub long_candles: Option<&'a [Candle]>, // Pre-breakout resolution
    pub regime: RegimeState,
    pub hot_sector: bool,
}

/// Candle-only checks that passed
#[derive(Debug, Clone)]
pub struct Screened {
    pub volume_ratio: f64,
    pub green: SignalResult,
}

pub struct CompositeScorer {
    config: ScorerConfig,
}

impl CompositeScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Cheap vetoes that need only the primary series
    pub fn screen(&self, candles: &[Candle]) -> Result<Screened, Rejection> {
        let need = self.config.min_candles.max(2);
        if candles.len() < need {
            return Err(Rejection::InsufficientCandles {
                have: candles.len(),
                need,
            });
        }

        let pump = pump_and_dump(candles, &self.config.pump_dump);
        if pump.triggered {
            return Err(Rejection::PumpAndDump(
                pump.description.unwrap_or_else(|| "vetoed".to_string()),
            ));
        }

        let ratio = volume_ratio(candles, self.config.spike.lookback).unwrap_or(0.0);
        let last_quote_volume = candles.last().map(Candle::quote_volume).unwrap_or(0.0);
        if last_quote_volume < self.config.min_candle_quote_volume
            && ratio < self.config.min_volume_ratio
        {
            return Err(Rejection::LowVolume {
                quote_volume: last_quote_volume,
                ratio,
            });
        }

        let green = green_ratio(candles, &self.config.green);
        if !green.triggered {
            return Err(Rejection::WeakCandles);
        }

        Ok(Screened {
            volume_ratio: ratio,
            green,
        })
    }

    pub fn evaluate(&self, input: &ScoreInput<'_>) -> Result<ScoreCard, Rejection> {
        let screened = self.screen(input.candles)?;

        if let Some(book) = input.order_book {
            if book.imbalance < self.config.min_imbalance
                || book.imbalance > self.config.max_imbalance
            {
                return Err(Rejection::ImbalanceOutOfBand(book.imbalance));
            }
        }

        let config = &self.config;
        let readings = IndicatorReadings {
            volume_ratio: screened.volume_ratio,
            spike: volume_spike(input.candles, &config.spike),
            accumulation: volume_accumulation(input.candles, &config.accumulation),
            consolidation: consolidation(input.candles, &config.consolidation),
            higher_lows: higher_lows(input.candles, &config.higher_lows),
            green: screened.green,
            trend: trend_band_direction(input.candles, &config.trend_band),
            pre_breakout: input
                .long_candles
                .map(|c| pre_breakout(c, &config.pre_breakout))
                .unwrap_or_else(SignalResult::none),
        };

        let breakdown = ScoreBreakdown {
            volume: volume_points(readings.volume_ratio),
            order_book: input
                .order_book
                .map(|book| self.order_book_points(book))
                .unwrap_or(0.0),
            spike: config.spike_weight.contribution(&readings.spike),
            accumulation: config.accumulation_weight.contribution(&readings.accumulation),
            consolidation: config.consolidation_weight.contribution(&readings.consolidation),
            higher_lows: config.higher_lows_weight.contribution(&readings.higher_lows),
            green: config.green_weight.contribution(&readings.green),
            trend: match readings.trend {
                TrendDirection::Up => config.trend_bonus,
                TrendDirection::Down => -config.trend_bonus,
                TrendDirection::Neutral => 0.0,
            },
            pre_breakout: config.pre_breakout_weight.contribution(&readings.pre_breakout),
            hot_sector: if input.hot_sector {
                config.hot_sector_bonus
            } else {
                0.0
            },
        };

        let score = breakdown.total().round().clamp(0.0, 100.0) as u32;
        let label = self.label_for(score, input.regime);

        Ok(ScoreCard {
            score,
            label,
            breakdown,
            readings,
            imbalance: input.order_book.map(|b| b.imbalance),
        })
    }

    fn order_book_points(&self, book: &OrderBookSummary) -> f64 {
        let depth = if book.bid_depth >= self.config.min_bid_depth {
            10.0
        } else {
            0.0
        };
        let pressure = if book.imbalance >= self.config.strong_imbalance {
            10.0
        } else {
            5.0
        };
        depth + pressure
    }

    /// Tier for a score, or None below the regime's minimum
    pub fn label_for(&self, score: u32, regime: RegimeState) -> Option<ScoreLabel> {
        let config = &self.config;
        let label = if score >= config.gold_threshold {
            ScoreLabel::Gold
        } else if score >= config.silver_threshold {
            ScoreLabel::Silver
        } else if score >= config.bronze_threshold && config.bronze_enabled {
            ScoreLabel::Bronze
        } else {
            return None;
        };

        match regime {
            RegimeState::Permissive => Some(label),
            RegimeState::Cautious | RegimeState::Restrictive => {
                (label == ScoreLabel::Gold).then_some(label)
            }
        }
    }
}

fn volume_points(ratio: f64) -> f64 {
    if ratio >= 3.0 {
        30.0
    } else if ratio >= 2.0 {
        22.0
    } else if ratio >= 1.5 {
        15.0
    } else if ratio >= 1.2 {
        8.0
    } else {
        0.0
    }
}
