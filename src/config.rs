use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::discovery::PrefilterConfig;
use crate::engine::EngineConfig;
use crate::execution::{CacheConfig, GatewayConfig, PositionConfig};
use crate::regime::{RegimeConfig, SectorConfig};
use crate::strategy::ScorerConfig;

pub const DEFAULT_CONFIG_PATH: &str = "scanner.toml";
const ENV_PREFIX: &str = "SCANNER";

/// Every tunable of the scanner, one table per component
///
/// Missing tables and keys fall back to the compiled-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub gateway: GatewayConfig,
    pub cache: CacheConfig,
    pub regime: RegimeConfig,
    pub sector: SectorConfig,
    pub prefilter: PrefilterConfig,
    pub scorer: ScorerConfig,
    pub positions: PositionConfig,
    pub engine: EngineConfig,
}

impl ScannerConfig {
    /// Optional TOML file, then `SCANNER__<TABLE>__<KEY>` overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        let settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

/// Notification credentials, read from the environment only
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub telegram_token: Option<String>,
    pub chat_id: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            telegram_token: std::env::var("TELEGRAM_TOKEN").ok(),
            chat_id: std::env::var("CHAT_ID").ok(),
        }
    }
}
