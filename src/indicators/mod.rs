// Technical indicators module
// Pure functions over candle series; each returns a SignalResult

pub mod atr;
pub mod pre_breakout;
pub mod pump_dump;
pub mod structure;
pub mod trend_band;
pub mod volume;

pub use atr::{atr_percent, calculate_atr, calculate_atr_series};
pub use pre_breakout::{pre_breakout, PreBreakoutConfig};
pub use pump_dump::{pump_and_dump, PumpDumpConfig};
pub use structure::{consolidation, green_ratio, higher_lows, ConsolidationConfig, RatioConfig};
pub use trend_band::{trend_band_direction, TrendBandConfig, TrendDirection};
pub use volume::{
    volume_accumulation, volume_ratio, volume_spike, AccumulationConfig, VolumeSpikeConfig,
};
