use crate::models::MarketSnapshot;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};

/// Named group of symbols that tend to move together
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SectorDefinition {
    pub name: String,
    pub members: Vec<String>,
}

impl SectorDefinition {
    pub fn new(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

pub fn default_sectors() -> Vec<SectorDefinition> {
    vec![
        SectorDefinition::new(
            "AI",
            &["FETUSDT", "RENDERUSDT", "TAOUSDT", "WLDUSDT", "ARKMUSDT", "NEARUSDT"],
        ),
        SectorDefinition::new(
            "MEME",
            &["PEPEUSDT", "SHIBUSDT", "FLOKIUSDT", "BONKUSDT", "WIFUSDT", "BOMEUSDT"],
        ),
        SectorDefinition::new(
            "L2",
            &["ARBUSDT", "OPUSDT", "STRKUSDT", "MANTAUSDT", "METISUSDT", "IMXUSDT"],
        ),
        SectorDefinition::new(
            "DEFI",
            &["UNIUSDT", "AAVEUSDT", "LDOUSDT", "CRVUSDT", "PENDLEUSDT", "DYDXUSDT"],
        ),
        SectorDefinition::new(
            "GAMING",
            &["AXSUSDT", "SANDUSDT", "MANAUSDT", "GALAUSDT", "BEAMXUSDT", "PIXELUSDT"],
        ),
        SectorDefinition::new(
            "RWA",
            &["ONDOUSDT", "POLYXUSDT", "OMUSDT", "TRUUSDT", "CFGUSDT"],
        ),
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectorConfig {
    pub min_members: usize, // Members present in the snapshot
    pub hot_change_min: f64,
    pub hot_rising_fraction_min: f64,
    pub top_movers: usize,
    pub sectors: Vec<SectorDefinition>,
}

impl Default for SectorConfig {
    fn default() -> Self {
        Self {
            min_members: 2,
            hot_change_min: 3.0,
            hot_rising_fraction_min: 0.6,
            top_movers: 3,
            sectors: default_sectors(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorStats {
    pub name: String,
    pub avg_change: f64,
    pub rising_fraction: f64,
    pub members_present: usize,
}

/// Sectors currently receiving inflow, plus the union of their members
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotSectorSet {
    pub sectors: BTreeSet<String>,
    pub symbols: HashSet<String>,
}

impl HotSectorSet {
    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotationEvent {
    pub entered: Vec<String>,
    pub exited: Vec<String>,
    pub top_movers: Vec<(String, f64)>, // (symbol, 24h change) from entered sectors
    pub stats: Vec<SectorStats>,        // Stats of the entered sectors
}

pub fn sector_stats(
    snapshot: &MarketSnapshot,
    sector: &SectorDefinition,
    min_members: usize,
) -> Option<SectorStats> {
    let changes: Vec<f64> = sector
        .members
        .iter()
        .filter_map(|m| snapshot.get(m))
        .map(|t| t.price_change_pct)
        .collect();

    if changes.is_empty() || changes.len() < min_members {
        return None;
    }

    let n = changes.len() as f64;
    Some(SectorStats {
        name: sector.name.clone(),
        avg_change: changes.iter().sum::<f64>() / n,
        rising_fraction: changes.iter().filter(|&&c| c > 0.0).count() as f64 / n,
        members_present: changes.len(),
    })
}

/// Hot sectors for one snapshot
pub fn hot_sectors(snapshot: &MarketSnapshot, config: &SectorConfig) -> HotSectorSet {
    let mut hot = HotSectorSet::default();

    for sector in &config.sectors {
        let Some(stats) = sector_stats(snapshot, sector, config.min_members) else {
            continue;
        };
        if stats.avg_change >= config.hot_change_min
            && stats.rising_fraction >= config.hot_rising_fraction_min
        {
            hot.sectors.insert(sector.name.clone());
            hot.symbols.extend(sector.members.iter().cloned());
        }
    }

    hot
}

/// Tracks the hot set across refreshes and reports rotations
pub struct SectorRotationTracker {
    config: SectorConfig,
    hot: HotSectorSet,
}

impl SectorRotationTracker {
    pub fn new(config: SectorConfig) -> Self {
        Self {
            config,
            hot: HotSectorSet::default(),
        }
    }

    pub fn hot(&self) -> &HotSectorSet {
        &self.hot
    }

    pub fn is_hot_symbol(&self, symbol: &str) -> bool {
        self.hot.contains_symbol(symbol)
    }

    /// Recompute the hot set; returns an event when sectors entered or left it
    pub fn refresh(&mut self, snapshot: &MarketSnapshot) -> Option<RotationEvent> {
        let next = hot_sectors(snapshot, &self.config);

        let entered: Vec<String> = next.sectors.difference(&self.hot.sectors).cloned().collect();
        let exited: Vec<String> = self.hot.sectors.difference(&next.sectors).cloned().collect();
        self.hot = next;

        if entered.is_empty() && exited.is_empty() {
            return None;
        }

        let entered_defs: Vec<&SectorDefinition> = self
            .config
            .sectors
            .iter()
            .filter(|s| entered.contains(&s.name))
            .collect();

        let mut movers: Vec<(String, f64)> = entered_defs
            .iter()
            .flat_map(|s| s.members.iter())
            .filter_map(|m| snapshot.get(m).map(|t| (m.clone(), t.price_change_pct)))
            .collect();
        movers.sort_by(|a, b| b.1.total_cmp(&a.1));
        movers.dedup_by(|a, b| a.0 == b.0);
        movers.truncate(self.config.top_movers);

        let stats = entered_defs
            .iter()
            .filter_map(|s| sector_stats(snapshot, s, self.config.min_members))
            .collect();

        tracing::info!(
            "🔄 Sector rotation: entered {:?}, exited {:?}",
            entered,
            exited
        );

        Some(RotationEvent {
            entered,
            exited,
            top_movers: movers,
            stats,
        })
    }
}
