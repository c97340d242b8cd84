// Consensus and validation logic

pub mod pow;
pub mod validation;

pub use pow::{CancelToken, Miner, MiningResult, Target};
pub use validation::SpendValidator;
