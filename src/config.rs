use crate::mining::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Units minted by every coinbase transaction.
pub const DEFAULT_COINBASE_REWARD: u64 = 100;

/// Credential carried by the genesis coinbase input.
pub const GENESIS_DATA: &str = "First Transaction from Genesis";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub mining: MiningConfig,
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Leading zero bits required of a block hash. Fixed for the life of a chain.
    pub difficulty: u32,
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub coinbase_reward: u64,
    pub genesis_memo: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: Self::home_dir(),
            },
            mining: MiningConfig {
                difficulty: DEFAULT_DIFFICULTY,
                threads: num_cpus::get(),
            },
            consensus: ConsensusConfig {
                coinbase_reward: DEFAULT_COINBASE_REWARD,
                genesis_memo: GENESIS_DATA.to_string(),
            },
        }
    }
}

impl Config {
    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.storage.data_dir = data_dir.into();
        self
    }

    /// Location of the block store inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join("blocks")
    }

    pub fn validate(&self) -> Result<()> {
        if self.mining.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidInput(format!(
                "difficulty {} exceeds maximum {}",
                self.mining.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.mining.threads == 0 {
            return Err(LedgerError::InvalidInput("mining threads must be at least 1".to_string()));
        }
        if self.consensus.coinbase_reward == 0 {
            return Err(LedgerError::InvalidInput("coinbase reward must be positive".to_string()));
        }
        Ok(())
    }

    /// Loads the default config file, writing one with defaults if absent.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    fn home_dir() -> PathBuf {
        let home_dir = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".hashledger")
    }

    fn config_path() -> PathBuf {
        Self::home_dir().join("config.json")
    }
}
