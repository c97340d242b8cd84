// Proof-of-work UTXO ledger

pub mod core;
pub mod consensus;
pub mod chain;
pub mod storage;
pub mod wallet;
pub mod config;
pub mod error;
mod cli;

// Re-exports for convenience
pub use core::{Block, Hash256, PubKeyHash, Transaction, TxInput, TxOutput};
pub use consensus::{CancelToken, Miner, MiningResult, SpendValidator, Target};
pub use chain::{Ledger, OutPoint, UtxoResolver};
pub use storage::{ChainBatch, ChainStore, SledStore};
pub use wallet::{Address, Keystore, KeyPair, KeyProvider, TransactionBuilder};
pub use config::ChainConfig;
pub use error::{Error, Result};
pub use cli::{Cli, CliHandler};
