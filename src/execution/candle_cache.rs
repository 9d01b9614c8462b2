use crate::models::{CandleSeries, Resolution};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Freshness windows per resolution
///
/// An entry is fresh while its age is below the TTL. With the default
/// cadences (deep scan every 120 s, regime every 300 s) the M15 and H1
/// windows expire before the next pass asks again, so only H4 series are
/// served across passes. M15 and H1 hits come from repeated reads within
/// one pass and from `score_symbol`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_m15_secs: i64,
    pub ttl_h1_secs: i64,
    pub ttl_h4_secs: i64,
    pub compaction_factor: i64, // Entries older than factor × longest TTL are dropped
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_m15_secs: 120,
            ttl_h1_secs: 300,
            ttl_h4_secs: 900,
            compaction_factor: 4,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self, resolution: Resolution) -> Duration {
        let secs = match resolution {
            Resolution::M15 => self.ttl_m15_secs,
            Resolution::H1 => self.ttl_h1_secs,
            Resolution::H4 => self.ttl_h4_secs,
        };
        Duration::seconds(secs)
    }

    fn longest_ttl(&self) -> Duration {
        Resolution::ALL
            .iter()
            .map(|r| self.ttl(*r))
            .max()
            .unwrap_or_else(Duration::zero)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    series: CandleSeries,
    fetched_at: DateTime<Utc>,
    limit: usize, // Candle count requested when fetched
}

/// In-memory candle series cache keyed by (symbol, resolution)
///
/// Only successful fetches are stored. Reads never touch the network; the
/// gateway fills the cache on a miss.
pub struct CandleCache {
    entries: HashMap<(String, Resolution), CacheEntry>,
    config: CacheConfig,
    hits: u64,
    misses: u64,
}

impl CandleCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            hits: 0,
            misses: 0,
        }
    }

    /// Fresh series with at least `limit` candles requested, trimmed to the last `limit`
    pub fn get_at(
        &mut self,
        symbol: &str,
        resolution: Resolution,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Option<CandleSeries> {
        let ttl = self.config.ttl(resolution);
        let fresh = self
            .entries
            .get(&(symbol.to_string(), resolution))
            .filter(|entry| now - entry.fetched_at < ttl && entry.limit >= limit);

        match fresh {
            Some(entry) => {
                self.hits += 1;
                let start = entry.series.len().saturating_sub(limit);
                Some(entry.series[start..].to_vec())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert_at(
        &mut self,
        symbol: &str,
        resolution: Resolution,
        limit: usize,
        series: CandleSeries,
        now: DateTime<Utc>,
    ) {
        self.entries.insert(
            (symbol.to_string(), resolution),
            CacheEntry {
                series,
                fetched_at: now,
                limit,
            },
        );
    }

    /// Drop entries older than the compaction horizon, returns how many were removed
    pub fn compact_at(&mut self, now: DateTime<Utc>) -> usize {
        let horizon = self.config.longest_ttl() * self.config.compaction_factor.max(1) as i32;
        let before = self.entries.len();
        self.entries.retain(|_, entry| now - entry.fetched_at <= horizon);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
