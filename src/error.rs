// Error types shared by the ledger, miner, wallet and CLI

use crate::core::Hash256;
use thiserror::Error;

/// Crate-wide error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Insufficient funds: have {available}, need {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("Unknown prior transaction: {0}")]
    UnknownPriorTransaction(Hash256),

    #[error("Transaction {tx_id} has no output {index}")]
    InvalidOutputReference { tx_id: Hash256, index: i32 },

    #[error("Signature verification failed for transaction {0}")]
    SignatureVerificationFailed(Hash256),

    #[error("No valid nonce found up to {max_nonce}")]
    NonceSpaceExhausted { max_nonce: u64 },

    #[error("Mining cancelled")]
    MiningCancelled,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("No key for address {0}")]
    UnknownAddress(String),

    #[error("Output {index} of transaction {tx_id} is already spent")]
    DoubleSpend { tx_id: Hash256, index: i32 },

    #[error("Outputs ({outputs}) exceed inputs ({inputs})")]
    ValueCreated { inputs: u64, outputs: u64 },

    #[error("Invalid coinbase {tx_id}: {reason}")]
    InvalidCoinbase { tx_id: Hash256, reason: String },

    #[error("Transaction {0} is already on chain or repeated in the block")]
    DuplicateTransaction(Hash256),

    #[error("Output values overflow")]
    ValueOverflow,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Difficulty must be between 1 and 255, got {0}")]
    InvalidDifficulty(u32),

    #[error("Blockchain does not exist")]
    ChainNotInitialized,

    #[error("Blockchain already exists")]
    ChainAlreadyExists,

    #[error("Corrupt block data: {0}")]
    CorruptBlock(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Keystore error: {0}")]
    Keystore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
