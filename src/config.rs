// Chain configuration passed explicitly into the miner and ledger

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Chain parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Proof-of-work difficulty in bits, target = 2^(256 - difficulty)
    pub difficulty: u32,
    /// Largest nonce the miner tries before failing
    pub max_nonce: u64,
    /// Value minted by a coinbase transaction
    pub block_reward: u64,
    /// Memo carried by the genesis coinbase input
    pub genesis_memo: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 12,
            max_nonce: i64::MAX as u64,
            block_reward: 100,
            genesis_memo: "Initial transaction from Genesis".to_string(),
        }
    }
}

impl ChainConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty == 0 || self.difficulty > 255 {
            return Err(Error::InvalidDifficulty(self.difficulty));
        }
        Ok(())
    }
}
