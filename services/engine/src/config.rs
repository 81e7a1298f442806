//! Runtime configuration
//!
//! Sane defaults, optional `config.toml` overrides, and environment
//! variables prefixed with `ENGINE_` (nested fields separated using `__`).
//! For example, `ENGINE_WITH_SNAPSHOT=true` or
//! `ENGINE_SNAPSHOT__INTERVAL_SECONDS=5`.

use serde::Deserialize;
use types::order::StpMode;

/// Top-level engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Attempt restore from the snapshot file on start; otherwise start
    /// from the seed state
    #[serde(default)]
    pub with_snapshot: bool,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    #[serde(default)]
    pub seed: SeedSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            with_snapshot: false,
            snapshot: SnapshotSettings::default(),
            seed: SeedSettings::default(),
        }
    }
}

/// Snapshot file location and cadence
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSettings {
    #[serde(default = "default_snapshot_path")]
    pub path: String,
    #[serde(default = "default_snapshot_interval")]
    pub interval_seconds: u64,
    /// zstd-compress the snapshot payload
    #[serde(default)]
    pub compress: bool,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
            interval_seconds: default_snapshot_interval(),
            compress: false,
        }
    }
}

fn default_snapshot_path() -> String {
    "engine-snapshot.bin".to_string()
}

fn default_snapshot_interval() -> u64 {
    3
}

/// Markets and balances used when starting without a snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSettings {
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketSeed>,
    #[serde(default)]
    pub balances: Vec<BalanceSeed>,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            markets: default_markets(),
            balances: Vec::new(),
        }
    }
}

fn default_markets() -> Vec<MarketSeed> {
    vec![MarketSeed {
        symbol: "TATA_INR".to_string(),
        stp_mode: StpMode::default(),
    }]
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketSeed {
    pub symbol: String,
    #[serde(default)]
    pub stp_mode: StpMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSeed {
    pub user_id: String,
    pub asset: String,
    /// Canonical decimal text
    pub amount: String,
}

impl Settings {
    /// Load settings from defaults, `config.toml` (optional), and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("ENGINE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
