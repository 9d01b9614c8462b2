// Market regime and sector rotation module
pub mod detector;
pub mod sector;

pub use detector::{MarketRegimeClassifier, RegimeConfig, RegimeState, RegimeTransition};
pub use sector::{
    default_sectors, hot_sectors, HotSectorSet, RotationEvent, SectorConfig, SectorDefinition,
    SectorRotationTracker, SectorStats,
};
