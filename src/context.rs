use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::config::StrategyConfig;
use crate::market_data::MarketData;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MARKET_DATA_FILE: &str = "market-data.bin";

/// Shared command state: the data directory layout and the strategy
/// configuration loaded from it.
#[derive(Clone)]
pub struct AppContext {
    data_dir: PathBuf,
    config: StrategyConfig,
}

impl AppContext {
    pub fn initialize(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let config_path = data_dir.join("config.json");
        let config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: StrategyConfig = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            info!("loaded configuration from {}", config_path.display());
            config
        } else {
            StrategyConfig::default()
        };
        config.validate()?;
        Ok(Self { data_dir, config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn portfolio_path(&self) -> PathBuf {
        self.data_dir.join("portfolio.json")
    }

    pub fn watchlist_path(&self) -> PathBuf {
        self.data_dir.join("watchlist.json")
    }

    pub fn sentiment_path(&self) -> PathBuf {
        self.data_dir.join("sentiment.json")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.data_dir.join("plans")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    pub fn market_data_path(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path.unwrap_or_else(|| self.data_dir.join(DEFAULT_MARKET_DATA_FILE))
    }

    pub fn load_market_data(&self, override_path: Option<PathBuf>) -> Result<MarketData> {
        let path = self.market_data_path(override_path);
        MarketData::load_from_file(&path)
    }

    /// Candidate universe: the symbol file when present, otherwise every
    /// symbol in the market data.
    pub fn load_universe(&self, data: &MarketData) -> Result<Vec<String>> {
        let path = self.universe_path();
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(raw
                .lines()
                .map(|line| line.trim().to_uppercase())
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .collect())
        } else {
            Ok(data.symbols().cloned().collect())
        }
    }

    pub fn universe_path(&self) -> PathBuf {
        self.data_dir.join("universe.txt")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
