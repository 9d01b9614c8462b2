// Scoring module
pub mod scorer;

pub use scorer::{
    BucketWeight, CompositeScorer, IndicatorReadings, Rejection, ScoreBreakdown, ScoreCard,
    ScoreInput, ScoreLabel, ScorerConfig, Screened,
};
