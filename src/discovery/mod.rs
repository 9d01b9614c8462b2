// Candidate discovery module
pub mod prefilter;

pub use prefilter::{check_symbol, select_candidates, Exclusion, PrefilterConfig, PrefilterContext};
